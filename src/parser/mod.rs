//! The hybrid workflow/action parser described by the specification:
//! a full YAML parse for authoritative triggers and step counts, plus a
//! line-oriented scanner for positions, reconciled by cross-checking step
//! counts and surfacing any disagreement as a warning rather than an error.

mod line_pass;
mod yaml_pass;

use crate::models::{ParseWarning, ParsedFile};

/// Parses raw workflow or composite-action text into a [`ParsedFile`].
/// Never panics or returns an error: malformed YAML degrades to a
/// line-only parse plus a warning.
pub fn parse_workflow(text: &str) -> ParsedFile {
    let yaml_facts = yaml_pass::extract(text);
    let line_result = line_pass::parse(text);

    let mut workflow = line_result.workflow;
    let mut warnings = line_result.warnings;

    if !yaml_facts.parsed_as_mapping {
        warnings.push(ParseWarning::NotYamlObject);
    } else {
        // The YAML pass is authoritative for the trigger list.
        workflow.triggers = yaml_facts.triggers;
    }

    for (job_id, yaml_count) in &yaml_facts.step_counts {
        let line_count = workflow
            .jobs
            .get(job_id)
            .map(|j| j.steps.len())
            .unwrap_or(0);
        if *yaml_count != line_count {
            warnings.push(ParseWarning::StepCountMismatch {
                job_id: job_id.clone(),
                yaml_count: *yaml_count,
                line_count,
            });
        }
    }

    ParsedFile { workflow, warnings }
}

/// Whether a `uses:` reference is an artifact-upload action: either the
/// local platform wrapper or any `actions/upload-artifact` version.
pub fn is_action_upload(uses: &str) -> bool {
    uses == "./.github/actions/ps-upload-artifacts"
        || uses.starts_with("actions/upload-artifact@")
}

/// Extracts the `path:` values declared in a step's `with:` block,
/// expanding a block-scalar list of paths (one per non-blank line) when
/// `path:` was written as `path: |`-style multi-line content.
pub fn extract_upload_paths(step: &crate::models::Step) -> Vec<String> {
    let Some(raw) = step.with_str("path") else {
        return Vec::new();
    };
    if raw.contains('\n') {
        raw.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        vec![raw.to_string()]
    }
}
