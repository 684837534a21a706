//! The per-step reference check (§4.3 "Per-step reference check"): applies
//! to every step's `uses:` and branches three ways depending on whether the
//! reference is a Docker image, a local action, or a remote action.

use camino::{Utf8Path, Utf8PathBuf};

use crate::models::{ActionRef, Step};
use crate::policy::PolicySet;
use crate::remote::{RemoteVerifier, VerifyReason};
use crate::violation::Violation;

use super::WorkflowCtx;

/// Resolves a local action reference (`./foo`, `.github/actions/foo`)
/// against the workspace root, rejecting any path that would climb above
/// it via `..`.
fn resolve_local(workspace_root: &Utf8Path, action: &str) -> Option<Utf8PathBuf> {
    let rel = action.strip_prefix("./").unwrap_or(action);
    let mut stack: Vec<&str> = Vec::new();
    for component in rel.split('/') {
        match component {
            "" | "." => {}
            ".." => stack.pop()?,
            other => stack.push(other),
        };
    }
    Some(workspace_root.join(stack.join("/")))
}

fn check_docker(path: &str, position: crate::models::Position, uses: &ActionRef) -> Vec<Violation> {
    let digest_pinned = uses
        .reference
        .strip_prefix("sha256:")
        .is_some_and(|digest| digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit()));

    if digest_pinned {
        Vec::new()
    } else {
        vec![Violation::new(
            path,
            "docker action not pinned by digest (@sha256:<digest>)",
            position,
            2,
        )]
    }
}

fn check_local(ctx: &WorkflowCtx<'_>, step: &Step, uses: &ActionRef) -> Vec<Violation> {
    let Some(resolved) = resolve_local(ctx.workspace_root, &uses.action) else {
        return vec![Violation::new(ctx.relative_path, "path escapes repo", step.position, 2)];
    };

    let actions_root = ctx.workspace_root.join(".github").join("actions");
    if !resolved.starts_with(&actions_root) {
        return vec![Violation::new(
            ctx.relative_path,
            format!("local action '{}' must live under .github/actions/", uses.action),
            step.position,
            2,
        )];
    }

    let has_action_file = resolved.join("action.yml").is_file() || resolved.join("action.yaml").is_file();
    if !has_action_file {
        return vec![Violation::new(
            ctx.relative_path,
            format!("local action '{}' has no sibling action.yml/action.yaml", uses.action),
            step.position,
            2,
        )];
    }

    Vec::new()
}

fn reason_violation(path: &str, position: crate::models::Position, action: &str, reason: VerifyReason) -> Violation {
    let (message, weight) = match reason {
        VerifyReason::RefNotFound => (format!("action ref '{action}' not found upstream"), 2),
        VerifyReason::ApiUnreachable => ("action ref could not be verified (GitHub API unreachable)".to_string(), 2),
        VerifyReason::Unauthorized => ("action ref verification unauthorized (check GH_TOKEN)".to_string(), 2),
        VerifyReason::ForbiddenOrRateLimited => ("action ref verification forbidden or rate-limited".to_string(), 2),
        VerifyReason::RateLimited => ("action ref verification rate-limited".to_string(), 2),
        VerifyReason::UnexpectedStatus => ("action ref verification failed with an unexpected status".to_string(), 2),
        VerifyReason::InvalidActionRef => ("invalid action reference".to_string(), 3),
        _ => ("action ref could not be verified".to_string(), 2),
    };
    Violation::new(path, message, position, weight)
}

async fn check_remote(
    ctx: &WorkflowCtx<'_>,
    step: &Step,
    uses: &ActionRef,
    policies: &PolicySet,
    verifier: Option<&RemoteVerifier>,
    verify_remote_enabled: bool,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    match uses.owner_repo() {
        Some(owner_repo) if !policies.allowed_actions.contains(owner_repo) => {
            violations.push(Violation::new(
                ctx.relative_path,
                format!("action '{owner_repo}' is not in the allow-list"),
                step.position,
                3,
            ));
        }
        None => {
            violations.push(Violation::new(ctx.relative_path, "invalid action reference", step.position, 3));
        }
        _ => {}
    }

    if !uses.is_sha_shaped() {
        violations.push(Violation::new(
            ctx.relative_path,
            "action not SHA-pinned",
            step.position,
            1,
        ));
    } else if let Some(verifier) = verifier {
        let outcome = verifier
            .verify(&uses.action, &uses.reference, verify_remote_enabled)
            .await;
        if !outcome.ok {
            if let Some(reason) = outcome.error {
                violations.push(reason_violation(ctx.relative_path, step.position, &uses.action, reason));
            }
        }
    }

    violations
}

pub async fn check_step_reference(
    ctx: &WorkflowCtx<'_>,
    step: &Step,
    uses: &ActionRef,
    policies: &PolicySet,
    verifier: Option<&RemoteVerifier>,
    verify_remote_enabled: bool,
) -> Vec<Violation> {
    if uses.is_docker() {
        check_docker(ctx.relative_path, step.position, uses)
    } else if uses.is_local() {
        check_local(ctx, step, uses)
    } else {
        check_remote(ctx, step, uses, policies, verifier, verify_remote_enabled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use camino::Utf8PathBuf;

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
    fn docker_requires_digest_pinning() {
        let uses = ActionRef::parse("docker://alpine:3");
        let v = check_docker("ci.yml", Position::new(1, 1), &uses);
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].weight, 2);
    }

    #[test]
    fn docker_with_valid_digest_passes() {
        let digest = "a".repeat(64);
        let uses = ActionRef::parse(&format!("docker://alpine@sha256:{digest}"));
        assert!(check_docker("ci.yml", Position::new(1, 1), &uses).is_empty());
    }

    #[test]
    fn resolve_local_rejects_escaping_path() {
        let root = Utf8PathBuf::from("/ws");
        assert!(resolve_local(&root, "../../etc/passwd").is_none());
    }

    #[test]
    fn resolve_local_joins_within_root() {
        let root = Utf8PathBuf::from("/ws");
        let resolved = resolve_local(&root, "./.github/actions/foo").unwrap();
        assert_eq!(resolved, Utf8PathBuf::from("/ws/.github/actions/foo"));
    }

    #[tokio::test]
    async fn non_sha_remote_ref_is_flagged_but_allowlist_still_runs() {
        let uses = ActionRef::parse("actions/checkout@v4");
        let root = Utf8PathBuf::from("/ws");
        let ctx = WorkflowCtx {
            relative_path: ".github/workflows/ci.yml",
            key: "ci",
            workspace_root: &root,
        };
        let step = Step {
            position: Position::new(5, 7),
            ..Default::default()
        };
        let policies = default_policies();
        let v = check_remote(&ctx, &step, &uses, &policies, None, true).await;
        // Not allow-listed (empty allow-list) AND not SHA-pinned.
        assert_eq!(v.len(), 2);
        assert!(v.iter().any(|x| x.weight == 3));
        assert!(v.iter().any(|x| x.weight == 1));
    }
}
