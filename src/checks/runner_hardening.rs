//! The hardened-runner-first check (§4.3): the first step of every job
//! must either directly be a hardened-runner step, or be
//! `actions/checkout@…` immediately followed by one.

use crate::models::{ActionRef, Job};
use crate::policy::PolicySet;
use crate::violation::Violation;

use super::WorkflowCtx;

const HARDEN_RUNNER_PREFIX: &str = "step-security/harden-runner@";
const CHECKOUT_PREFIX: &str = "actions/checkout@";

fn raw_uses(action: &ActionRef) -> String {
    if action.reference.is_empty() {
        action.action.clone()
    } else {
        format!("{}@{}", action.action, action.reference)
    }
}

fn is_hardened_runner(raw: &str, allowed_prefixes: &[String]) -> bool {
    raw.starts_with(HARDEN_RUNNER_PREFIX) || allowed_prefixes.iter().any(|p| raw.starts_with(p.as_str()))
}

pub fn check_first_step(
    ctx: &WorkflowCtx<'_>,
    job_id: &str,
    job: &Job,
    policies: &PolicySet,
) -> Vec<Violation> {
    let Some(first) = job.steps.first() else {
        return Vec::new();
    };

    let prefixes = &policies.root.rules.runner_hardening.allowed_first_steps;

    let first_raw = first.uses.as_ref().map(raw_uses);
    let first_is_hardened = first_raw.as_deref().is_some_and(|r| is_hardened_runner(r, prefixes));

    let checkout_then_hardened = first_raw
        .as_deref()
        .is_some_and(|r| r.starts_with(CHECKOUT_PREFIX))
        && job
            .steps
            .get(1)
            .and_then(|s| s.uses.as_ref())
            .map(raw_uses)
            .is_some_and(|r| is_hardened_runner(&r, prefixes));

    if first_is_hardened || checkout_then_hardened {
        return Vec::new();
    }

    vec![Violation::new(
        ctx.relative_path,
        format!("job '{job_id}': first step must be hardened runner"),
        first.position,
        2,
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Step;
    use camino::Utf8Path;

    fn ctx<'a>(root: &'a Utf8Path) -> WorkflowCtx<'a> {
        WorkflowCtx {
            relative_path: ".github/workflows/ci.yml",
            key: "ci",
            workspace_root: root,
        }
    }

    fn default_policies() -> PolicySet {
        PolicySet {
            root: serde_yaml::from_str("rules: {}\n").unwrap(),
            allowed_actions: Default::default(),
            unsafe_patterns: Default::default(),
            unsafe_pattern_allowlist: Default::default(),
            inline_bash_allowlist: Default::default(),
            high_risk_triggers: Default::default(),
            permissions_baseline: Default::default(),
            artifact_policy: Default::default(),
        }
    }

    fn step_with_uses(uses: &str) -> Step {
        Step {
            uses: Some(ActionRef::parse(uses)),
            ..Default::default()
        }
    }

    #[test]
    fn direct_hardened_runner_passes() {
        let root = Utf8Path::new("/ws");
        let mut job = Job::default();
        job.steps.push(step_with_uses(&format!(
            "step-security/harden-runner@{}",
            "a".repeat(40)
        )));
        assert!(check_first_step(&ctx(&root), "build", &job, &default_policies()).is_empty());
    }

    #[test]
    fn checkout_then_hardened_runner_passes() {
        let root = Utf8Path::new("/ws");
        let mut job = Job::default();
        job.steps.push(step_with_uses(&format!("actions/checkout@{}", "a".repeat(40))));
        job.steps.push(step_with_uses(&format!(
            "step-security/harden-runner@{}",
            "b".repeat(40)
        )));
        assert!(check_first_step(&ctx(&root), "build", &job, &default_policies()).is_empty());
    }

    #[test]
    fn checkout_alone_without_followup_is_flagged() {
        let root = Utf8Path::new("/ws");
        let mut job = Job::default();
        job.steps.push(step_with_uses(&format!("actions/checkout@{}", "a".repeat(40))));
        let v = check_first_step(&ctx(&root), "build", &job, &default_policies());
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].weight, 2);
    }

    #[test]
    fn unrelated_first_step_is_flagged() {
        let root = Utf8Path::new("/ws");
        let mut job = Job::default();
        job.steps.push(step_with_uses("actions/setup-node@v4"));
        let v = check_first_step(&ctx(&root), "build", &job, &default_policies());
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn empty_job_produces_no_violation() {
        let root = Utf8Path::new("/ws");
        let job = Job::default();
        assert!(check_first_step(&ctx(&root), "build", &job, &default_policies()).is_empty());
    }
}
