//! End-to-end scenarios mirroring spec.md §8 "End-to-end scenarios".

use predicates::prelude::*;

use crate::common::{sha, Fixture};

/// Scenario A — clean pass.
#[test]
fn scenario_a_clean_pass() {
    let fx = Fixture::new();
    fx.write_minimal_policies();
    fx.write(
        "configs/ci/policies/permissions-baseline.yml",
        "workflows:\n  ci:\n    contents: read\n",
    );
    fx.write(
        ".github/workflows/ci.yml",
        &format!(
            "on: push\n\
permissions:\n\
  contents: read\n\
jobs:\n\
  build:\n\
    permissions:\n\
      contents: read\n\
    steps:\n\
      - name: Harden Runner\n\
        uses: step-security/harden-runner@{harden_sha}\n\
      - name: Checkout\n\
        uses: actions/checkout@{checkout_sha}\n",
            harden_sha = sha('a'),
            checkout_sha = sha('b'),
        ),
    );

    fx.cmd()
        .arg("--no-verify-remote")
        .assert()
        .success();

    let report = fx.report();
    assert_eq!(report["score"], 100);
    assert_eq!(report["violations"].as_array().unwrap().len(), 0);
}

/// Scenario B — missing permissions + non-SHA ref.
#[test]
fn scenario_b_missing_permissions_and_unpinned_ref() {
    let fx = Fixture::new();
    fx.write_minimal_policies();
    fx.write(
        ".github/workflows/deploy.yml",
        "on: push\n\
jobs:\n\
  ship:\n\
    steps:\n\
      - name: Checkout\n\
        uses: actions/checkout@v4\n",
    );

    fx.cmd()
        .arg("--no-verify-remote")
        .assert()
        .failure()
        .code(1);

    let report = fx.report();
    assert_eq!(report["totalWeight"], 12);
    assert_eq!(report["deductionPercent"], 100);
    assert_eq!(report["score"], 0);

    let messages: Vec<String> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["message"].as_str().unwrap().to_string())
        .collect();
    assert!(messages.iter().any(|m| m.contains("no permissions baseline for workflow 'deploy'")));
    assert!(messages.iter().any(|m| m == "missing top-level permissions"));
    assert!(messages.iter().any(|m| m.contains("missing permissions")));
    assert!(messages.iter().any(|m| m.contains("hardened runner")));
    assert!(messages.iter().any(|m| m.contains("not SHA-pinned")));
}

/// Scenario C — unsafe pattern suppressed by the selector-based allowlist.
#[test]
fn scenario_c_unsafe_pattern_suppressed_by_allowlist() {
    let fx = Fixture::new();
    fx.write_minimal_policies();
    fx.write(
        "configs/ci/policies/permissions-baseline.yml",
        "workflows:\n  ci:\n    contents: read\n",
    );
    fx.write(
        "configs/ci/policies/unsafe-patterns.yml",
        "patterns:\n  - id: curl-pipe-sh\n    run_regex:\n      - 'curl .* \\| (ba)?sh'\n",
    );
    let workflow = format!(
        "on: push\n\
permissions:\n\
  contents: read\n\
jobs:\n\
  build:\n\
    permissions:\n\
      contents: read\n\
    steps:\n\
      - name: Harden Runner\n\
        uses: step-security/harden-runner@{harden_sha}\n\
      - name: Install\n\
        run: |\n\
          curl https://example.sh | bash\n",
        harden_sha = sha('a'),
    );
    fx.write(".github/workflows/ci.yml", &workflow);

    fx.cmd().arg("--no-verify-remote").assert().failure();
    let report = fx.report();
    let messages: Vec<String> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["message"].as_str().unwrap().to_string())
        .collect();
    assert!(messages.iter().any(|m| m.contains("unsafe pattern 'curl-pipe-sh'")));

    fx.write(
        "configs/ci/exceptions/unsafe-patterns-allowlist.yml",
        "allowlist:\n  - id: curl-pipe-sh\n    selector:\n      workflow_path: .github/workflows/ci.yml\n      job_id: build\n      step_name: Install\n",
    );

    fx.cmd().arg("--no-verify-remote").assert().success();
    let report = fx.report();
    let messages: Vec<String> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["message"].as_str().unwrap().to_string())
        .collect();
    assert!(!messages.iter().any(|m| m.contains("unsafe pattern")));
}

/// Scenario D — remote unreachable: strict (CI) mode fails closed, local
/// mode downgrades to a bypass and produces no violation for it.
#[test]
fn scenario_d_remote_unreachable() {
    let fx = Fixture::new();
    fx.write_minimal_policies();
    fx.write(
        "configs/ci/policies/permissions-baseline.yml",
        "workflows:\n  ci:\n    contents: read\n",
    );
    let workflow = format!(
        "on: push\n\
permissions:\n\
  contents: read\n\
jobs:\n\
  build:\n\
    permissions:\n\
      contents: read\n\
    steps:\n\
      - name: Harden Runner\n\
        uses: step-security/harden-runner@{harden_sha}\n\
      - name: Checkout\n\
        uses: actions/checkout@{checkout_sha}\n",
        harden_sha = sha('a'),
        checkout_sha = sha('b'),
    );
    fx.write(".github/workflows/ci.yml", &workflow);

    // CI strict mode, pointed at a host nothing listens on.
    fx.cmd()
        .env("CI", "1")
        .env("PS_VALIDATE_CI_GITHUB_API_BASE", "http://127.0.0.1:1")
        .assert()
        .failure();
    let report = fx.report();
    let messages: Vec<String> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["message"].as_str().unwrap().to_string())
        .collect();
    assert!(messages.iter().any(|m| m.contains("GitHub API unreachable")));

    // Local (non-CI) mode: same unreachable host downgrades to a bypass.
    fx.cmd()
        .env("PS_VALIDATE_CI_GITHUB_API_BASE", "http://127.0.0.1:1")
        .assert()
        .success();
    let report = fx.report();
    assert_eq!(report["violations"].as_array().unwrap().len(), 0);
}

/// Scenario E — inline-bash long script allowlisted with constraints; the
/// required-content violation fires but the unconstrained "too long" rule
/// does not, since the allowlist covers this step.
#[test]
fn scenario_e_inline_bash_allowlisted_with_missing_required_content() {
    let fx = Fixture::new();
    fx.write_minimal_policies();
    fx.write(
        "configs/ci/policies/permissions-baseline.yml",
        "workflows:\n  ci:\n    contents: read\n",
    );
    fx.write(
        "configs/ci/exceptions/inline-bash-allowlist.yml",
        "allowlist:\n  - id: long-deploy\n    selector:\n      workflow_path: .github/workflows/ci.yml\n      job_id: build\n      step_name: Deploy\nconstraints:\n  require:\n    run_contains_all:\n      - 'set -euo pipefail'\n",
    );

    let mut run_body = String::new();
    for _ in 0..40 {
        run_body.push_str("          echo \"token is ${{ secrets.TOKEN }}\"\n");
    }
    let workflow = format!(
        "on: push\n\
permissions:\n\
  contents: read\n\
jobs:\n\
  build:\n\
    permissions:\n\
      contents: read\n\
    steps:\n\
      - name: Harden Runner\n\
        uses: step-security/harden-runner@{harden_sha}\n\
      - name: Deploy\n\
        run: |\n\
{run_body}",
        harden_sha = sha('a'),
        run_body = run_body,
    );
    fx.write(".github/workflows/ci.yml", &workflow);

    fx.cmd().arg("--no-verify-remote").assert().failure();
    let report = fx.report();
    let messages: Vec<String> = report["violations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["message"].as_str().unwrap().to_string())
        .collect();

    assert!(messages.iter().any(|m| m == "missing required content"));
    assert!(messages.iter().any(|m| m == "secrets interpolated in run"));
    assert!(messages.iter().any(|m| m == "echo/printf used alongside secrets"));
    assert!(!messages.iter().any(|m| m.contains("exceeds")));
}

/// Scenario F — PR-only mode downgrade: unresolvable PR SHAs fall back to a
/// full scan rather than failing or silently scanning nothing.
#[test]
fn scenario_f_pr_only_mode_downgrades_to_full_scan() {
    let fx = Fixture::new();
    fx.write_minimal_policies();
    fx.write(
        ".github/workflows/deploy.yml",
        "on: push\njobs:\n  ship:\n    steps:\n      - run: echo hi\n",
    );

    fx.cmd()
        .arg("--pr-only")
        .arg("--no-verify-remote")
        .assert()
        .stderr(predicate::str::contains("PR-only mode").or(predicate::str::contains("falling back")))
        .failure();

    // The deploy.yml workflow was still scanned (full-scan fallback), not
    // silently skipped: its missing-permissions violations are present.
    let report = fx.report();
    assert!(!report["violations"].as_array().unwrap().is_empty());
}
