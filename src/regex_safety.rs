//! A safety gate in front of the `regex` crate.
//!
//! `regex` is already a linear-time engine that structurally rejects
//! backreferences and lookaround (it simply refuses to compile such
//! patterns), so it is not actually vulnerable to catastrophic
//! backtracking. The gate here exists as defense-in-depth per the
//! specification: it performs a textual pre-check over the pattern source
//! before compilation is ever attempted, so that a rejected pattern never
//! reaches the underlying engine and its rejection reason is attributable
//! to *this* validator rather than an opaque `regex` compile error.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegexSafetyError {
    #[error("pattern contains lookaround")]
    Lookaround,
    #[error("pattern contains a backreference")]
    Backreference,
    #[error("pattern contains a nested unbounded quantifier (catastrophic backtracking shape)")]
    NestedUnboundedQuantifier,
    #[error("unsupported regex flag '{0}'")]
    UnsupportedFlag(char),
    #[error("invalid regex syntax: {0}")]
    Syntax(String),
}

const SUPPORTED_FLAGS: &[char] = &['i', 'm', 'g', 's', 'u'];

/// Splits a `/pattern/flags`-or-bare pattern into its source and flag set.
/// Bare patterns (no leading/trailing `/`) have no flags.
pub fn split_flags(raw: &str) -> (&str, &str) {
    if raw.len() >= 2 && raw.starts_with('/') {
        if let Some(last_slash) = raw.rfind('/') {
            if last_slash > 0 {
                return (&raw[1..last_slash], &raw[last_slash + 1..]);
            }
        }
    }
    (raw, "")
}

fn validate_flags(flags: &str) -> Result<(), RegexSafetyError> {
    for c in flags.chars() {
        if !SUPPORTED_FLAGS.contains(&c) {
            return Err(RegexSafetyError::UnsupportedFlag(c));
        }
    }
    Ok(())
}

/// Tracks, for a single currently-open group, whether it is capturing and
/// whether its body directly or transitively contains an unbounded-
/// quantified sub-expression (the `X+`/`X*`/`X{n,}` shape).
struct GroupFrame {
    capturing: bool,
    contains_unbounded: bool,
}

/// If `s` begins with a quantifier (`+`, `*`, `?`, or a `{...}` repetition,
/// optionally followed by a lazy/possessive `?`/`+` modifier), returns the
/// byte length of that quantifier token and whether it is unbounded (`+`,
/// `*`, or `{n,}` with no upper bound). Returns `(0, false)` when `s` does
/// not start with a quantifier.
fn quantifier_at(s: &str) -> (usize, bool) {
    let bytes = s.as_bytes();
    let (mut len, unbounded) = match bytes.first() {
        Some(b'+') => (1, true),
        Some(b'*') => (1, true),
        Some(b'?') => (1, false),
        Some(b'{') => brace_quantifier(s).unwrap_or((0, false)),
        _ => (0, false),
    };
    if len > 0 {
        if let Some(&modifier) = bytes.get(len) {
            if modifier == b'?' || modifier == b'+' {
                len += 1;
            }
        }
    }
    (len, unbounded)
}

/// Parses a `{n}`/`{n,}`/`{n,m}` repetition brace at the start of `s`.
/// Returns its total byte length and whether it is unbounded (`{n,}`).
/// A malformed or non-numeric brace body (e.g. a literal `{`) is not a
/// quantifier at all, so this returns `None`.
fn brace_quantifier(s: &str) -> Option<(usize, bool)> {
    let rest = s.strip_prefix('{')?;
    let end = rest.find('}')?;
    let body = &rest[..end];
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == ',') {
        return None;
    }
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let unbounded = body.ends_with(',') && body[..body.len() - 1].chars().all(|c| c.is_ascii_digit());
    Some((end + 2, unbounded))
}

/// Applies a quantifier found at `pattern[*i..]`, if any, consuming it and
/// marking the innermost open group as containing an unbounded-quantified
/// atom when the quantifier is unbounded. Used after every atom (a single
/// character, an escape sequence, or a character class) so that plain
/// `a+`/`\d*`/`[a-z]{2,}` atoms register the same way a quantified group
/// does.
fn consume_quantifier(pattern: &str, i: &mut usize, group_stack: &mut [GroupFrame]) {
    let (len, unbounded) = quantifier_at(&pattern[*i..]);
    if unbounded {
        if let Some(frame) = group_stack.last_mut() {
            frame.contains_unbounded = true;
        }
    }
    *i += len;
}

/// Walks `pattern`, skipping escaped characters and the contents of
/// character classes, and rejects lookaround, backreferences, and the
/// `(X+)+`-shaped nested-unbounded-quantifier construct (an unbounded
/// quantifier applied to a capturing group whose own body already
/// contains an unbounded-quantified atom or sub-group).
fn check_pattern_shape(pattern: &str) -> Result<(), RegexSafetyError> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    let mut group_stack: Vec<GroupFrame> = Vec::new();

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if i + 1 < bytes.len() {
                    let next = bytes[i + 1];
                    // Backreferences: \1-\9, \k<name>
                    if next.is_ascii_digit() && next != b'0' {
                        return Err(RegexSafetyError::Backreference);
                    }
                    if next == b'k' {
                        return Err(RegexSafetyError::Backreference);
                    }
                }
                i += 2;
                consume_quantifier(pattern, &mut i, &mut group_stack);
                continue;
            }
            b'[' => {
                // Skip the character class verbatim (it can't itself be a
                // capturing group or lookaround).
                i += 1;
                if i < bytes.len() && bytes[i] == b']' {
                    i += 1;
                }
                while i < bytes.len() && bytes[i] != b']' {
                    if bytes[i] == b'\\' {
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                i += 1; // consume ']'
                consume_quantifier(pattern, &mut i, &mut group_stack);
                continue;
            }
            b'(' => {
                if pattern[i..].starts_with("(?=")
                    || pattern[i..].starts_with("(?!")
                    || pattern[i..].starts_with("(?<=")
                    || pattern[i..].starts_with("(?<!")
                {
                    return Err(RegexSafetyError::Lookaround);
                }
                // A capturing group: plain `(` not followed by `?`.
                let capturing = !pattern[i..].starts_with("(?");
                group_stack.push(GroupFrame { capturing, contains_unbounded: false });
                i += 1;
                continue;
            }
            b')' => {
                let frame = group_stack
                    .pop()
                    .unwrap_or(GroupFrame { capturing: false, contains_unbounded: false });
                i += 1;
                // Look at what quantifier (if any) follows this group.
                let (quantifier_len, quantified_unbounded) = quantifier_at(&pattern[i..]);
                if frame.capturing && frame.contains_unbounded && quantified_unbounded {
                    return Err(RegexSafetyError::NestedUnboundedQuantifier);
                }
                // An enclosing group inherits this group's repetition-ness,
                // so a pattern like `((a+)+)+` is caught one level up too.
                if let Some(parent) = group_stack.last_mut() {
                    if frame.contains_unbounded || quantified_unbounded {
                        parent.contains_unbounded = true;
                    }
                }
                i += quantifier_len;
                continue;
            }
            _ => {
                i += 1;
                consume_quantifier(pattern, &mut i, &mut group_stack);
                continue;
            }
        }
    }

    Ok(())
}

/// Compiles `raw` (optionally of the form `/pattern/flags`) into a
/// [`regex::Regex`] after the safety gate passes.
pub fn compile(raw: &str) -> Result<regex::Regex, RegexSafetyError> {
    let (source, flags) = split_flags(raw);
    validate_flags(flags)?;
    check_pattern_shape(source)?;

    let mut builder = regex::RegexBuilder::new(source);
    builder.case_insensitive(flags.contains('i'));
    builder.multi_line(flags.contains('m'));
    builder.dot_matches_new_line(flags.contains('s'));
    builder.unicode(flags.contains('u') || true);

    builder
        .build()
        .map_err(|e| RegexSafetyError::Syntax(e.to_string()))
}
