//! The top-level and per-job permission checks (§4.3 "Top-level permission
//! check" / "Per-job permission check").

use crate::models::{Job, Position, Workflow};
use crate::policy::PolicySet;
use crate::violation::Violation;

use super::WorkflowCtx;

/// Compares every declared permission entry against its baseline-or-default
/// maximum, pushing an "elevated without justification" violation for each
/// entry that exceeds it and carries no justification comment.
fn check_elevation(
    ctx: &WorkflowCtx<'_>,
    permissions: &crate::models::Permissions,
    policies: &PolicySet,
    position: Position,
    weight: u32,
    violations: &mut Vec<Violation>,
) {
    for (perm, entry) in permissions {
        let max_allowed = policies.permissions_baseline.max_allowed(ctx.key, perm);
        if entry.level > max_allowed && !entry.has_justification {
            violations.push(Violation::new(
                ctx.relative_path,
                format!("permissions '{perm}' elevated without justification"),
                position,
                weight,
            ));
        }
    }
}

pub fn check_top_level(ctx: &WorkflowCtx<'_>, workflow: &Workflow, policies: &PolicySet) -> Vec<Violation> {
    let mut violations = Vec::new();

    let has_baseline = policies.permissions_baseline.has_baseline(ctx.key);
    if !has_baseline && !workflow.permissions_declared {
        violations.push(Violation::at_file(
            ctx.relative_path,
            format!("no permissions baseline for workflow '{}'", ctx.key),
            3,
        ));
        violations.push(Violation::at_file(
            ctx.relative_path,
            "missing top-level permissions",
            3,
        ));
    }

    if has_baseline {
        check_elevation(
            ctx,
            &workflow.permissions,
            policies,
            Position::new(1, 1),
            2,
            &mut violations,
        );
    }

    violations
}

pub fn check_job(
    ctx: &WorkflowCtx<'_>,
    job_id: &str,
    job: &Job,
    policies: &PolicySet,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    if !job.permissions_declared {
        violations.push(Violation::new(
            ctx.relative_path,
            format!("job '{job_id}' missing permissions"),
            job.position,
            3,
        ));
    }

    if policies.permissions_baseline.has_baseline(ctx.key) {
        check_elevation(ctx, &job.permissions, policies, job.position, 2, &mut violations);
    }

    violations
}
