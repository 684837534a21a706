//! `configs/ci/policies/artifact-policy.yml`.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct ArtifactAllowlistEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RawArtifactPolicyFile {
    #[serde(default)]
    pub required_paths: Vec<String>,
    #[serde(default)]
    pub policy: Option<PolicyBlock>,
    pub allowlist: HashMap<String, Vec<ArtifactAllowlistEntry>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PolicyBlock {
    #[serde(default)]
    pub required_paths: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ArtifactPolicy {
    pub required_paths: Vec<String>,
    allowlist: HashMap<String, HashSet<String>>,
}

impl ArtifactPolicy {
    pub fn from_raw(raw: RawArtifactPolicyFile) -> Self {
        let mut required_paths = raw.required_paths;
        if required_paths.is_empty() {
            if let Some(block) = &raw.policy {
                required_paths = block.required_paths.clone();
            }
        }

        let allowlist = raw
            .allowlist
            .into_iter()
            .map(|(k, entries)| (k, entries.into_iter().map(|e| e.name).collect()))
            .collect();

        Self {
            required_paths,
            allowlist,
        }
    }

    pub fn has_allowlist(&self, workflow_key: &str) -> bool {
        self.allowlist.contains_key(workflow_key)
    }

    pub fn is_allowed(&self, workflow_key: &str, artifact_name: &str) -> bool {
        self.allowlist
            .get(workflow_key)
            .map(|names| names.contains(artifact_name))
            .unwrap_or(false)
    }
}
