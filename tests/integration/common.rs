use std::fs;
use std::path::Path;

use assert_cmd::Command;
use camino::Utf8PathBuf;
use tempfile::TempDir;

/// A fixture workspace: a scratch directory holding both the repository
/// under test (`.github/workflows/**`) and its policy tree
/// (`configs/ci/**`), torn down when dropped.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create fixture tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, contents: &str) -> &Self {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    /// Writes the eight policy files in their most permissive valid shape;
    /// individual tests override the ones they care about afterward.
    pub fn write_minimal_policies(&self) -> &Self {
        self.write("configs/ci/policies/validate-ci.yml", "rules: {}\n");
        self.write(
            "configs/ci/exceptions/actions-allowlist.yml",
            "allowlist:\n  - repo: actions/checkout\n  - repo: step-security/harden-runner\n",
        );
        self.write("configs/ci/policies/unsafe-patterns.yml", "patterns: []\n");
        self.write(
            "configs/ci/exceptions/unsafe-patterns-allowlist.yml",
            "allowlist: []\n",
        );
        self.write(
            "configs/ci/exceptions/inline-bash-allowlist.yml",
            "allowlist: []\n",
        );
        self.write(
            "configs/ci/exceptions/high-risk-triggers-allowlist.yml",
            "high_risk_triggers: []\nallowlist: []\n",
        );
        self.write(
            "configs/ci/policies/permissions-baseline.yml",
            "workflows: {}\n",
        );
        self.write(
            "configs/ci/policies/artifact-policy.yml",
            "allowlist: {}\n",
        );
        self
    }

    /// A `validate-ci` invocation pre-armed with `--workspace` and with the
    /// progress bar and network-auth env vars out of the way.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("validate-ci").expect("binary not built");
        cmd.arg("--workspace")
            .arg(self.dir.path())
            .arg("--no-progress")
            .env_remove("CI")
            .env_remove("GH_TOKEN")
            .env_remove("GITHUB_TOKEN")
            .env_remove("PS_VALIDATE_CI_PR_ONLY")
            .env_remove("PS_VALIDATE_CI_VERIFY_REMOTE");
        cmd
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join("reports/validate-ci/validate-ci.json")).unwrap()
    }

    pub fn report(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.report_path()).expect("report was not written");
        serde_json::from_str(&text).expect("report is not valid JSON")
    }
}

/// A 40-character lowercase-hex string built by repeating `c`, matching the
/// SHA-pinning shape the parser and checks expect.
pub fn sha(c: char) -> String {
    std::iter::repeat(c).take(40).collect()
}
