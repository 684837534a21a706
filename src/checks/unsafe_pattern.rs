//! The unsafe-pattern check (§4.3): a `uses`-matcher and a `run`-matcher,
//! each independently evaluated against every step, with suppression via
//! the selector-based unsafe-pattern allowlist.

use crate::models::Step;
use crate::policy::PolicySet;
use crate::policy::unsafe_patterns::UnsafePattern;
use crate::regex_safety;
use crate::violation::Violation;

use super::{step_context, WorkflowCtx};

fn uses_matches(pattern: &UnsafePattern, step: &Step) -> bool {
    let Some(selector_repo) = &pattern.uses else {
        return false;
    };
    let Some(owner_repo) = step.uses.as_ref().and_then(|u| u.owner_repo()) else {
        return false;
    };
    if owner_repo != selector_repo.as_str() {
        return false;
    }

    pattern.with.iter().all(|(key, expected)| {
        step.with_str(key)
            .map(|actual| actual.trim_matches('"') == expected.as_str())
            .unwrap_or(false)
    })
}

fn run_matches(pattern: &UnsafePattern, step: &Step, violations: &mut Vec<Violation>, path: &str) -> bool {
    let mut matched = false;
    for raw_regex in &pattern.run_regex {
        match regex_safety::compile(raw_regex) {
            Ok(re) => {
                if re.is_match(&step.run) {
                    matched = true;
                }
            }
            Err(e) => {
                violations.push(Violation::new(
                    path,
                    format!("invalid regex in unsafe pattern '{}': {e}", pattern.id),
                    step.position,
                    3,
                ));
            }
        }
    }
    matched
}

pub fn check_step(ctx: &WorkflowCtx<'_>, job_id: &str, step: &Step, policies: &PolicySet) -> Vec<Violation> {
    let mut violations = Vec::new();
    let step_ctx = step_context(ctx, job_id, step);

    for pattern in &policies.unsafe_patterns.patterns {
        let suppressed = policies.unsafe_pattern_allowlist.suppresses(&pattern.id, &step_ctx);
        if suppressed {
            continue;
        }

        if uses_matches(pattern, step) {
            violations.push(Violation::new(
                ctx.relative_path,
                format!("unsafe pattern '{}'", pattern.id),
                step.position,
                3,
            ));
        }

        if run_matches(pattern, step, &mut violations, ctx.relative_path) {
            violations.push(Violation::new(
                ctx.relative_path,
                format!("unsafe pattern '{}'", pattern.id),
                step.position,
                3,
            ));
        }
    }

    violations
}
