//! The line-oriented half of the parser: an indentation-driven state
//! machine that recovers positions for everything the check engine needs
//! to point diagnostics at, following the standard two-space GitHub
//! Actions YAML indentation convention:
//!
//! ```text
//! permissions:            # indent 0  (top-level)
//!   contents: read         # indent 2  -> top-level permission entry
//! jobs:                    # indent 0
//!   build:                 # indent 2  -> job id
//!     permissions:         # indent 4
//!       contents: read     # indent 6  -> job permission entry
//!     steps:               # indent 4
//!       - name: Checkout   # indent 6  -> step start
//!         uses: ...@v4     # indent 8  -> step continuation
//!         with:            # indent 8
//!           path: out/     # indent 10 -> with: entry
//! ```
//!
//! This never fails: malformed or inconsistently indented input simply
//! produces a best-effort, possibly partial, structure plus warnings.

use indexmap::IndexMap;

use crate::models::{
    ActionRef, Job, ParseWarning, Permissions, Position, RunLine, Step, WithValue, Workflow,
};

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    TopLevel,
    TopPermissions,
    Jobs,
    InJob { job: String },
    JobPermissions { job: String },
    Steps { job: String },
    /// Within a step's continuation keys (`uses:`, `run:`, `with:`, ...).
    StepBody { job: String, step: usize },
    WithBlock { job: String, step: usize },
    RunBlock { job: String, step: usize, indent: usize },
}

pub struct LineResult {
    pub workflow: Workflow,
    pub warnings: Vec<ParseWarning>,
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

fn is_blank_or_comment(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Splits a `key: value` line (already trimmed of leading whitespace) into
/// `(key, value)`, stripping a trailing unquoted comment from `value`.
fn split_key_value(trimmed: &str) -> Option<(&str, &str)> {
    let colon = find_unquoted_colon(trimmed)?;
    let key = trimmed[..colon].trim();
    let rest = trimmed[colon + 1..].trim();
    Some((key, strip_trailing_comment(rest)))
}

fn find_unquoted_colon(s: &str) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    for (i, c) in s.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ':' if !in_single && !in_double => {
                // Must be followed by whitespace or end-of-string to be a
                // mapping separator, not e.g. a URL scheme.
                if s[i + 1..].is_empty() || s.as_bytes()[i + 1] == b' ' {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_trailing_comment(s: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'#' if !in_single && !in_double && (i == 0 || bytes[i - 1] == b' ') => {
                return s[..i].trim_end();
            }
            _ => {}
        }
        i += 1;
    }
    s.trim_end()
}

fn comment_of(s: &str) -> Option<&str> {
    let mut in_single = false;
    let mut in_double = false;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' if !in_double => in_single = !in_single,
            b'"' if !in_single => in_double = !in_double,
            b'#' if !in_single && !in_double && (i == 0 || bytes[i - 1] == b' ') => {
                return Some(&s[i..]);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn has_alias_token(s: &str) -> bool {
    let bytes = s.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'&' || b == b'*') && (i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b':') {
            if let Some(&next) = bytes.get(i + 1) {
                if next.is_ascii_alphabetic() || next == b'_' {
                    return true;
                }
            }
        }
    }
    false
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Parses `text` line-by-line, returning a partially-or-fully populated
/// [`Workflow`] plus any warnings encountered along the way.
pub fn parse(text: &str) -> LineResult {
    let mut workflow = Workflow::default();
    let mut warnings = Vec::new();
    let mut mode = Mode::TopLevel;

    let lines: Vec<&str> = text.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        let lineno = i + 1;
        let indent = indent_of(raw);
        let trimmed = raw.trim();

        // Block-scalar run bodies capture raw lines verbatim (including
        // lines that would otherwise look like comments or blanks), until
        // indentation falls back to the parent's level.
        if let Mode::RunBlock { job, step, indent: block_indent } = &mode {
            if !trimmed.is_empty() && indent <= *block_indent {
                // falls through to re-dispatch this line below
            } else {
                if let Some(j) = workflow.jobs.get_mut(job) {
                    if let Some(s) = j.steps.get_mut(*step) {
                        let text_line = if raw.len() > *block_indent {
                            &raw[(*block_indent).min(raw.len())..]
                        } else {
                            ""
                        };
                        s.run_lines.push(RunLine {
                            text: text_line.to_string(),
                            position: Position::new(lineno, block_indent + 1),
                        });
                        if !s.run.is_empty() {
                            s.run.push('\n');
                        }
                        s.run.push_str(text_line);
                    }
                }
                i += 1;
                continue;
            }
        }

        if is_blank_or_comment(trimmed) {
            i += 1;
            continue;
        }

        if has_alias_token(trimmed) {
            warnings.push(ParseWarning::YamlAlias { line: lineno });
        }

        // Drop out of nested modes whose indentation has ended. Indent 0
        // always means a fresh top-level key, regardless of what came
        // before.
        if indent == 0 {
            mode = Mode::TopLevel;
        } else {
            match &mode {
                Mode::JobPermissions { job } if indent < 6 => {
                    mode = Mode::InJob { job: job.clone() };
                }
                Mode::StepBody { job, .. } | Mode::WithBlock { job, .. } if indent < 8 => {
                    mode = Mode::Steps { job: job.clone() };
                }
                Mode::Steps { job } if indent < 6 => {
                    mode = Mode::InJob { job: job.clone() };
                }
                Mode::RunBlock { job, step, .. } if indent >= 8 => {
                    mode = Mode::StepBody { job: job.clone(), step: *step };
                }
                Mode::RunBlock { job, .. } if indent < 8 => {
                    mode = Mode::Steps { job: job.clone() };
                }
                _ => {}
            }
        }

        match &mode {
            Mode::TopLevel if indent == 0 => {
                if let Some((key, value)) = split_key_value(trimmed) {
                    match key {
                        "permissions" => {
                            workflow.permissions_declared = true;
                            mode = Mode::TopPermissions;
                        }
                        "jobs" => mode = Mode::Jobs,
                        _ => {}
                    }
                    let _ = value;
                }
            }
            Mode::TopPermissions if indent == 2 => {
                if let Some((key, value)) = split_key_value(trimmed) {
                    let has_justification = comment_of(trimmed)
                        .map(|c| c.to_ascii_lowercase().contains("justification"))
                        .unwrap_or(false);
                    workflow.permissions.insert(
                        key.to_string(),
                        crate::models::PermissionEntry {
                            level: crate::models::PermissionLevel::parse(&unquote(value)),
                            has_justification,
                        },
                    );
                }
            }
            Mode::Jobs if indent == 2 => {
                if let Some(job_id) = trimmed.strip_suffix(':') {
                    workflow.jobs.insert(
                        job_id.to_string(),
                        Job {
                            position: Position::new(lineno, indent + 1),
                            ..Default::default()
                        },
                    );
                    mode = Mode::InJob { job: job_id.to_string() };
                }
            }
            Mode::InJob { job } if indent == 4 => {
                if let Some((key, _)) = split_key_value(trimmed) {
                    match key {
                        "permissions" => {
                            if let Some(j) = workflow.jobs.get_mut(job) {
                                j.permissions_declared = true;
                            }
                            mode = Mode::JobPermissions { job: job.clone() };
                        }
                        "steps" => mode = Mode::Steps { job: job.clone() },
                        _ => {}
                    }
                }
            }
            Mode::JobPermissions { job } if indent == 6 => {
                if let Some((key, value)) = split_key_value(trimmed) {
                    let has_justification = comment_of(trimmed)
                        .map(|c| c.to_ascii_lowercase().contains("justification"))
                        .unwrap_or(false);
                    if let Some(j) = workflow.jobs.get_mut(job) {
                        j.permissions.insert(
                            key.to_string(),
                            crate::models::PermissionEntry {
                                level: crate::models::PermissionLevel::parse(&unquote(value)),
                                has_justification,
                            },
                        );
                    }
                }
            }
            Mode::Steps { job } if indent == 6 && trimmed.starts_with('-') => {
                let rest = trimmed[1..].trim_start();
                let mut step = Step {
                    position: Position::new(lineno, 7),
                    ..Default::default()
                };
                let mut enter_run_block = false;
                let mut enter_with_block = false;
                if !rest.is_empty() {
                    if let Some((key, value)) = split_key_value(rest) {
                        if key == "run"
                            && (value == "|" || value == ">" || value.starts_with('|') || value.starts_with('>'))
                        {
                            enter_run_block = true;
                        } else if key == "with" {
                            enter_with_block = true;
                        } else {
                            apply_step_key(&mut step, key, value, lineno, indent + 2);
                        }
                    }
                }
                if let Some(j) = workflow.jobs.get_mut(job) {
                    j.steps.push(step);
                    let idx = j.steps.len() - 1;
                    mode = if enter_run_block {
                        // The dash line's own indent is the block's parent
                        // indent; continuation lines are more indented.
                        Mode::RunBlock { job: job.clone(), step: idx, indent }
                    } else if enter_with_block {
                        Mode::WithBlock { job: job.clone(), step: idx }
                    } else {
                        Mode::StepBody { job: job.clone(), step: idx }
                    };
                }
            }
            Mode::StepBody { job, step } if indent == 8 => {
                if let Some((key, value)) = split_key_value(trimmed) {
                    if key == "with" {
                        mode = Mode::WithBlock { job: job.clone(), step: *step };
                    } else if key == "run" {
                        if value == "|" || value == ">" || value.starts_with('|') || value.starts_with('>')
                        {
                            mode = Mode::RunBlock { job: job.clone(), step: *step, indent };
                        } else if let Some(j) = workflow.jobs.get_mut(job) {
                            if let Some(s) = j.steps.get_mut(*step) {
                                let v = unquote(value);
                                s.run_lines.push(RunLine {
                                    text: v.clone(),
                                    position: Position::new(lineno, indent + key.len() + 3),
                                });
                                s.run = v;
                            }
                        }
                    } else if let Some(j) = workflow.jobs.get_mut(job) {
                        if let Some(s) = j.steps.get_mut(*step) {
                            apply_step_key(s, key, value, lineno, indent + key.len() + 3);
                        }
                    }
                }
            }
            Mode::WithBlock { job, step } if indent == 10 => {
                if let Some((key, value)) = split_key_value(trimmed) {
                    if let Some(j) = workflow.jobs.get_mut(job) {
                        if let Some(s) = j.steps.get_mut(*step) {
                            s.with.insert(
                                key.to_string(),
                                WithValue {
                                    value: unquote(value),
                                    position: Position::new(lineno, indent + 1),
                                },
                            );
                        }
                    }
                }
            }
            _ => {}
        }

        i += 1;
    }

    // Cross-check step counts against the YAML pass happens in the caller,
    // since it needs both results at once.
    let _: &IndexMap<String, Job> = &workflow.jobs;

    LineResult { workflow, warnings }
}

fn apply_step_key(step: &mut Step, key: &str, value: &str, lineno: usize, col: usize) {
    match key {
        "name" => step.name = Some(unquote(value)),
        "id" => step.id = Some(unquote(value)),
        "uses" => {
            step.uses = Some(ActionRef::parse(&unquote(value)));
            step.uses_position = Some(Position::new(lineno, col));
        }
        "run" => {
            let v = unquote(value);
            step.run_lines.push(RunLine {
                text: v.clone(),
                position: Position::new(lineno, col),
            });
            step.run = v;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "\
on: push
permissions:
  contents: read
jobs:
  build:
    permissions:
      contents: read
    steps:
      - name: Checkout
        uses: actions/checkout@v4
      - name: Run
        run: |
          echo one
          echo two
";

    #[test]
    fn parses_top_level_permissions() {
        let r = parse(SIMPLE);
        assert!(r.workflow.permissions_declared);
        assert_eq!(
            r.workflow.permissions["contents"].level,
            crate::models::PermissionLevel::Read
        );
    }

    #[test]
    fn parses_job_and_steps() {
        let r = parse(SIMPLE);
        let job = &r.workflow.jobs["build"];
        assert!(job.permissions_declared);
        assert_eq!(job.steps.len(), 2);
        assert_eq!(
            job.steps[0].uses.as_ref().unwrap().action,
            "actions/checkout"
        );
    }

    #[test]
    fn captures_run_block_scalar_lines() {
        let r = parse(SIMPLE);
        let job = &r.workflow.jobs["build"];
        let step = &job.steps[1];
        assert_eq!(step.run_lines.len(), 2);
        assert_eq!(step.run_lines[0].text, "echo one");
        assert_eq!(step.run_lines[1].text, "echo two");
        assert_eq!(step.run, "echo one\necho two");
    }

    #[test]
    fn detects_justification_comment() {
        let text = "permissions:\n  contents: write  # justification: needed for release\njobs: {}\n";
        let r = parse(text);
        assert!(r.workflow.permissions["contents"].has_justification);
    }

    #[test]
    fn detects_alias_tokens() {
        let text = "on: push\nfoo: &anchor bar\njobs: {}\n";
        let r = parse(text);
        assert_eq!(r.warnings.len(), 1);
        assert!(matches!(r.warnings[0], ParseWarning::YamlAlias { line: 2 }));
    }

    #[test]
    fn captures_with_block() {
        let text = "\
jobs:
  build:
    steps:
      - uses: actions/upload-artifact@v4
        with:
          path: out/
          name: artifact
";
        let r = parse(text);
        let step = &r.workflow.jobs["build"].steps[0];
        assert_eq!(step.with_str("path"), Some("out/"));
        assert_eq!(step.with_str("name"), Some("artifact"));
    }
}
