//! The high-risk trigger check (§4.3).

use crate::models::{Position, Workflow};
use crate::policy::PolicySet;
use crate::violation::Violation;

use super::WorkflowCtx;

pub fn check_high_risk_triggers(
    ctx: &WorkflowCtx<'_>,
    workflow: &Workflow,
    policies: &PolicySet,
) -> Vec<Violation> {
    workflow
        .triggers
        .iter()
        .filter(|trigger| policies.high_risk_triggers.is_high_risk(trigger))
        .filter(|trigger| !policies.high_risk_triggers.is_allowlisted(trigger, ctx.relative_path))
        .map(|trigger| {
            Violation::new(
                ctx.relative_path,
                format!("high-risk trigger '{trigger}' not allowlisted"),
                Position::new(1, 1),
                1,
            )
        })
        .collect()
}
