//! `configs/ci/exceptions/actions-allowlist.yml`.

use std::collections::HashSet;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawEntry {
    repo: String,
    #[serde(default = "default_true")]
    allowed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RawAllowlistFile {
    pub allowlist: Vec<RawEntry>,
}

#[derive(Debug, Default)]
pub struct AllowedActions {
    repos: HashSet<String>,
}

impl AllowedActions {
    pub fn from_raw(raw: RawAllowlistFile) -> Self {
        let repos = raw
            .allowlist
            .into_iter()
            .filter(|e| e.allowed)
            .map(|e| e.repo)
            .collect();
        Self { repos }
    }

    pub fn contains(&self, owner_repo: &str) -> bool {
        self.repos.contains(owner_repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_filters_disallowed_entries() {
        let raw: RawAllowlistFile = serde_yaml::from_str(
            "allowlist:\n  - repo: actions/checkout\n    allowed: true\n  - repo: evil/action\n    allowed: false\n",
        )
        .unwrap();
        let allowed = AllowedActions::from_raw(raw);
        assert!(allowed.contains("actions/checkout"));
        assert!(!allowed.contains("evil/action"));
    }

    #[test]
    fn allowed_defaults_to_true_when_omitted() {
        let raw: RawAllowlistFile =
            serde_yaml::from_str("allowlist:\n  - repo: actions/checkout\n").unwrap();
        let allowed = AllowedActions::from_raw(raw);
        assert!(allowed.contains("actions/checkout"));
    }
}
