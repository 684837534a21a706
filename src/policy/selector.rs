//! The selector shape shared by three exception tables: unsafe-pattern
//! allowlisting, inline-bash allowlisting, and (in spirit) high-risk
//! trigger allowlisting. A selector lacking both `step_id` and `step_name`
//! must never match any step — this prevents an under-specified entry
//! from silently suppressing every step in a workflow.

use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Selector {
    pub workflow_path: Option<String>,
    pub job_id: Option<String>,
    pub step_id: Option<String>,
    pub step_name: Option<String>,
}

/// The facts about a concrete step that a [`Selector`] is matched against.
pub struct StepContext<'a> {
    pub workflow_path: &'a str,
    pub job_id: &'a str,
    pub step_id: Option<&'a str>,
    pub step_name: Option<&'a str>,
}

impl Selector {
    pub fn matches(&self, ctx: &StepContext<'_>) -> bool {
        if self.step_id.is_none() && self.step_name.is_none() {
            return false;
        }

        if let Some(path) = &self.workflow_path {
            if path != ctx.workflow_path {
                return false;
            }
        }

        if let Some(job_id) = &self.job_id {
            if job_id != ctx.job_id {
                return false;
            }
        }

        if let Some(step_id) = &self.step_id {
            if Some(step_id.as_str()) != ctx.step_id {
                return false;
            }
        }

        if let Some(step_name) = &self.step_name {
            if Some(step_name.as_str()) != ctx.step_name {
                return false;
            }
        }

        true
    }
}
