//! The check engine (§4.3): applies every rule family to a parsed workflow
//! or composite action and accumulates [`Violation`]s. None of the checks
//! short-circuit one another — all are additive, matching the "all rules
//! always run" model the specification describes.

mod artifacts;
mod composite;
mod inline_run;
mod permissions;
mod runner_hardening;
mod step_reference;
mod triggers;
mod unsafe_pattern;

use camino::Utf8Path;

use crate::models::Workflow;
use crate::policy::PolicySet;
use crate::policy::selector::StepContext;
use crate::remote::RemoteVerifier;
use crate::violation::Violation;

pub use composite::check_composite_action;

/// Everything the per-workflow rule families need to know about *where*
/// they are running, as distinct from *what* they're checking.
pub struct WorkflowCtx<'a> {
    /// The path reported in violation records, relative to the workspace
    /// root when possible (e.g. `.github/workflows/ci.yml`).
    pub relative_path: &'a str,
    /// The workflow key used for policy lookups (file stem).
    pub key: &'a str,
    pub workspace_root: &'a Utf8Path,
}

pub(crate) fn step_context<'a>(
    ctx: &WorkflowCtx<'a>,
    job_id: &'a str,
    step: &'a crate::models::Step,
) -> StepContext<'a> {
    StepContext {
        workflow_path: ctx.relative_path,
        job_id,
        step_id: step.id.as_deref(),
        step_name: step.name.as_deref(),
    }
}

/// Runs every workflow-level and job/step-level rule family against a
/// single parsed workflow, returning every violation found. Per §4.3 the
/// ordering is: top-level checks, then per-job checks, then per-step
/// checks, then the workflow-wide artifact check.
pub async fn check_workflow(
    ctx: &WorkflowCtx<'_>,
    workflow: &Workflow,
    policies: &PolicySet,
    verifier: Option<&RemoteVerifier>,
    verify_remote_enabled: bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    violations.extend(permissions::check_top_level(ctx, workflow, policies));
    violations.extend(triggers::check_high_risk_triggers(ctx, workflow, policies));

    for (job_id, job) in &workflow.jobs {
        violations.extend(permissions::check_job(ctx, job_id, job, policies));
        violations.extend(runner_hardening::check_first_step(ctx, job_id, job, policies));

        for step in &job.steps {
            if let Some(uses) = &step.uses {
                violations.extend(
                    step_reference::check_step_reference(
                        ctx,
                        step,
                        uses,
                        policies,
                        verifier,
                        verify_remote_enabled,
                    )
                    .await,
                );
            }

            violations.extend(unsafe_pattern::check_step(ctx, job_id, step, policies));

            if !step.run.is_empty() || !step.run_lines.is_empty() {
                violations.extend(inline_run::check_step(ctx, job_id, step, policies));
            }
        }
    }

    violations.extend(artifacts::check_workflow(ctx, workflow, policies));

    violations
}
