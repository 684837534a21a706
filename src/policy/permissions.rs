//! `configs/ci/policies/permissions-baseline.yml`.
//!
//! The `unspecified` default is read from either `defaults:` or `policy:`
//! for backward compatibility with older policy authors; new policy files
//! should standardize on `policy:` (see `DESIGN.md`, Open Question #2).

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::PermissionLevel;

#[derive(Clone, Debug, Deserialize)]
pub struct DefaultsBlock {
    #[serde(default)]
    pub unspecified: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawPermissionsBaselineFile {
    #[serde(default)]
    pub defaults: Option<DefaultsBlock>,
    #[serde(default)]
    pub policy: Option<DefaultsBlock>,
    pub workflows: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Default)]
pub struct PermissionsBaseline {
    pub default_unspecified: PermissionLevel,
    workflows: HashMap<String, HashMap<String, PermissionLevel>>,
}

impl PermissionsBaseline {
    pub fn from_raw(raw: RawPermissionsBaselineFile) -> Self {
        let raw_default = raw
            .policy
            .and_then(|b| b.unspecified)
            .or_else(|| raw.defaults.and_then(|b| b.unspecified));

        let default_unspecified = raw_default
            .map(|s| PermissionLevel::parse(&s))
            .unwrap_or(PermissionLevel::Read);

        let workflows = raw
            .workflows
            .into_iter()
            .map(|(k, perms)| {
                let perms = perms
                    .into_iter()
                    .map(|(perm, level)| (perm, PermissionLevel::parse(&level)))
                    .collect();
                (k, perms)
            })
            .collect();

        Self {
            default_unspecified,
            workflows,
        }
    }

    pub fn has_baseline(&self, workflow_key: &str) -> bool {
        self.workflows.contains_key(workflow_key)
    }

    /// The maximum-allowed level for `permission` under `workflow_key`'s
    /// baseline, falling back to the global `unspecified` default when the
    /// workflow has a baseline but no entry for this specific permission.
    pub fn max_allowed(&self, workflow_key: &str, permission: &str) -> PermissionLevel {
        self.workflows
            .get(workflow_key)
            .and_then(|perms| perms.get(permission))
            .copied()
            .unwrap_or(self.default_unspecified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_policy_over_defaults() {
        let raw: RawPermissionsBaselineFile = serde_yaml::from_str(
            "defaults:\n  unspecified: write\npolicy:\n  unspecified: read\nworkflows: {}\n",
        )
        .unwrap();
        let baseline = PermissionsBaseline::from_raw(raw);
        assert_eq!(baseline.default_unspecified, PermissionLevel::Read);
    }

    #[test]
    fn falls_back_to_defaults_block() {
        let raw: RawPermissionsBaselineFile = serde_yaml::from_str(
            "defaults:\n  unspecified: none\nworkflows: {}\n",
        )
        .unwrap();
        let baseline = PermissionsBaseline::from_raw(raw);
        assert_eq!(baseline.default_unspecified, PermissionLevel::None);
    }

    #[test]
    fn per_workflow_baseline_lookup() {
        let raw: RawPermissionsBaselineFile = serde_yaml::from_str(
            "workflows:\n  ci:\n    contents: read\n",
        )
        .unwrap();
        let baseline = PermissionsBaseline::from_raw(raw);
        assert!(baseline.has_baseline("ci"));
        assert!(!baseline.has_baseline("deploy"));
        assert_eq!(baseline.max_allowed("ci", "contents"), PermissionLevel::Read);
    }
}
