//! The artifact policy check (§4.3): collects upload artifact names and
//! declared upload paths across every step in the workflow, then compares
//! them against the per-workflow allow-list and required-path list.

use crate::models::{Position, Workflow};
use crate::parser::{extract_upload_paths, is_action_upload};
use crate::policy::PolicySet;
use crate::violation::Violation;

use super::WorkflowCtx;

const PARAMETRIC_MARKER: &str = "inputs.artifact_paths";

pub fn check_workflow(ctx: &WorkflowCtx<'_>, workflow: &Workflow, policies: &PolicySet) -> Vec<Violation> {
    if !policies.artifact_policy.has_allowlist(ctx.key) {
        return Vec::new();
    }

    let mut names = Vec::new();
    let mut paths = Vec::new();

    for job in workflow.jobs.values() {
        for step in &job.steps {
            let Some(uses) = step.uses.as_ref() else {
                continue;
            };
            let raw = if uses.reference.is_empty() {
                uses.action.clone()
            } else {
                format!("{}@{}", uses.action, uses.reference)
            };
            if !is_action_upload(&raw) {
                continue;
            }
            if let Some(name) = step.with_str("name") {
                names.push(name.to_string());
            }
            paths.extend(extract_upload_paths(step));
        }
    }

    let mut violations = Vec::new();

    for name in &names {
        if !policies.artifact_policy.is_allowed(ctx.key, name) {
            violations.push(Violation::new(
                ctx.relative_path,
                format!("artifact '{name}' not allowlisted"),
                Position::new(1, 1),
                1,
            ));
        }
    }

    let parametric = paths.iter().any(|p| p.contains(PARAMETRIC_MARKER));
    if !parametric {
        for required in &policies.artifact_policy.required_paths {
            if !paths.iter().any(|p| p.contains(required.as_str())) {
                violations.push(Violation::new(
                    ctx.relative_path,
                    format!("missing required artifact path '{required}'"),
                    Position::new(1, 1),
                    1,
                ));
            }
        }
    }

    violations
}
