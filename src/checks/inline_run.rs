//! The inline-run check (§4.3): secrets hygiene (always enforced) plus
//! either the default inline-bash constraints or the allowlisted
//! constraints, depending on whether the step is covered by the
//! inline-bash allowlist.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::Step;
use crate::policy::PolicySet;
use crate::regex_safety;
use crate::violation::Violation;

use super::{step_context, WorkflowCtx};

static SECRETS_INTERPOLATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*secrets\.[A-Za-z0-9_]+\s*\}\}").unwrap());

static SET_EUO_PIPEFAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bset\s+-euo\s+pipefail\b").unwrap());

static XTRACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"set\s+-x\b|set\s+-o\s+xtrace\b").unwrap());

static ECHO_PRINTF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(echo|printf)\b").unwrap());

fn non_comment_non_blank_lines(step: &Step) -> usize {
    step.run_lines
        .iter()
        .filter(|l| {
            let t = l.text.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .count()
}

fn check_secrets_hygiene(ctx: &WorkflowCtx<'_>, step: &Step, violations: &mut Vec<Violation>) {
    if SECRETS_INTERPOLATION.is_match(&step.run) {
        violations.push(Violation::new(
            ctx.relative_path,
            "secrets interpolated in run",
            step.position,
            3,
        ));
    }

    let with_has_secret = step.with.values().any(|v| SECRETS_INTERPOLATION.is_match(&v.value));
    if with_has_secret {
        violations.push(Violation::new(
            ctx.relative_path,
            "secrets interpolated in 'with'",
            step.position,
            3,
        ));
    }

    if XTRACE.is_match(&step.run) && SECRETS_INTERPOLATION.is_match(&step.run) {
        violations.push(Violation::new(
            ctx.relative_path,
            "debug xtrace used alongside secrets",
            step.position,
            3,
        ));
    }

    let echo_alongside_secret = step
        .run_lines
        .iter()
        .any(|l| SECRETS_INTERPOLATION.is_match(&l.text) && ECHO_PRINTF.is_match(&l.text));
    if echo_alongside_secret {
        violations.push(Violation::new(
            ctx.relative_path,
            "echo/printf used alongside secrets",
            step.position,
            3,
        ));
    }
}

pub fn check_step(ctx: &WorkflowCtx<'_>, job_id: &str, step: &Step, policies: &PolicySet) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_secrets_hygiene(ctx, step, &mut violations);

    let step_ctx = step_context(ctx, job_id, step);
    let covered = policies.inline_bash_allowlist.covers(&step_ctx);

    if !covered {
        if !SET_EUO_PIPEFAIL.is_match(&step.run) {
            violations.push(Violation::new(
                ctx.relative_path,
                "missing 'set -euo pipefail'",
                step.position,
                1,
            ));
        }

        let max_lines = policies.root.rules.inline_bash.max_inline_lines;
        if non_comment_non_blank_lines(step) > max_lines {
            violations.push(Violation::new(
                ctx.relative_path,
                format!("inline script exceeds {max_lines} lines"),
                step.position,
                1,
            ));
        }
    } else {
        let constraints = &policies.inline_bash_allowlist.constraints;

        for raw in &constraints.forbid_regex {
            if let Ok(re) = regex_safety::compile(raw) {
                if re.is_match(&step.run) {
                    violations.push(Violation::new(
                        ctx.relative_path,
                        "allowlist constraints violated",
                        step.position,
                        2,
                    ));
                    break;
                }
            }
        }

        for required in &constraints.require_contains {
            let present = if required == "set -euo pipefail" {
                SET_EUO_PIPEFAIL.is_match(&step.run)
            } else {
                step.run.contains(required.as_str())
            };
            if !present {
                violations.push(Violation::new(
                    ctx.relative_path,
                    "missing required content",
                    step.position,
                    2,
                ));
            }
        }
    }

    if policies.root.rules.outputs_and_artifacts.require_section_headers
        && !step.run.is_empty()
        && !step.run.contains("print-section.sh")
    {
        violations.push(Violation::new(
            ctx.relative_path,
            "missing section header (print-section.sh)",
            step.position,
            1,
        ));
    }

    violations
}
