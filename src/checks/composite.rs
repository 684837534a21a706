//! The composite-action scan (§4.3 "Composite-action scan"): a lighter
//! line-level pass over `action.yml`/`action.yaml` files, validating each
//! `uses:` line exactly as the remote-action contract of the per-step
//! reference check, but ignoring local `./…` references at this layer.

use crate::models::{ActionRef, Position};
use crate::policy::PolicySet;
use crate::remote::RemoteVerifier;
use crate::violation::Violation;

use super::step_reference;
use super::WorkflowCtx;

/// A minimal stand-in for the full [`crate::models::Step`] the per-step
/// reference check expects, since composite actions are scanned line by
/// line rather than parsed into jobs.
fn bare_step(position: Position) -> crate::models::Step {
    crate::models::Step {
        position,
        ..Default::default()
    }
}

fn find_uses_lines(text: &str) -> Vec<(Position, ActionRef)> {
    let mut found = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let trimmed = raw.trim_start();
        let indent = raw.len() - trimmed.len();
        let Some(rest) = trimmed.strip_prefix("uses:") else {
            continue;
        };
        let value = rest.trim();
        let value = value.split(" #").next().unwrap_or(value).trim();
        let value = value.trim_matches('"').trim_matches('\'');
        if value.is_empty() {
            continue;
        }
        let column = indent + "uses:".len() + 2;
        found.push((Position::new(i + 1, column), ActionRef::parse(value)));
    }
    found
}

pub async fn check_composite_action(
    ctx: &WorkflowCtx<'_>,
    text: &str,
    policies: &PolicySet,
    verifier: Option<&RemoteVerifier>,
    verify_remote_enabled: bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (position, action_ref) in find_uses_lines(text) {
        if action_ref.is_local() {
            continue;
        }
        let step = bare_step(position);
        violations.extend(
            step_reference::check_step_reference(
                ctx,
                &step,
                &action_ref,
                policies,
                verifier,
                verify_remote_enabled,
            )
            .await,
        );
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

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

    #[test]
    fn finds_uses_lines_with_positions() {
        let text = "runs:\n  using: composite\n  steps:\n    - uses: actions/checkout@v4\n    - run: echo hi\n";
        let found = find_uses_lines(text);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.line, 4);
        assert_eq!(found[0].1.action, "actions/checkout");
    }

    #[test]
    fn ignores_local_references() {
        let text = "runs:\n  steps:\n    - uses: ./.github/actions/inner\n";
        assert_eq!(find_uses_lines(text)[0].1.action, "./.github/actions/inner");
    }

    #[tokio::test]
    async fn local_reference_produces_no_violations() {
        let text = "runs:\n  steps:\n    - uses: ./.github/actions/inner\n";
        let root = Utf8Path::new("/ws");
        let ctx = WorkflowCtx {
            relative_path: "configs/ci/actions/foo/action.yml",
            key: "foo",
            workspace_root: &root,
        };
        let v = check_composite_action(&ctx, text, &default_policies(), None, true).await;
        assert!(v.is_empty());
    }

    #[tokio::test]
    async fn unpinned_remote_reference_is_flagged() {
        let text = "runs:\n  steps:\n    - uses: actions/checkout@v4\n";
        let root = Utf8Path::new("/ws");
        let ctx = WorkflowCtx {
            relative_path: "configs/ci/actions/foo/action.yml",
            key: "foo",
            workspace_root: &root,
        };
        let v = check_composite_action(&ctx, text, &default_policies(), None, true).await;
        assert!(v.iter().any(|x| x.weight == 1));
    }
}
