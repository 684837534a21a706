//! The policy loader: resolves the eight policy files under
//! `<platform_root>/configs/ci/` into immutable in-memory tables.
//!
//! Per the specification, loading is all-or-nothing: any missing, empty,
//! non-YAML, or structurally incomplete file is a fatal
//! [`PolicyError`], raised before a single workflow is scanned.

pub mod allowlist;
pub mod artifacts;
pub mod exceptions;
pub mod permissions;
pub mod rules;
pub mod selector;

use std::fs;

use camino::Utf8Path;
use thiserror::Error;

use allowlist::AllowedActions;
use artifacts::ArtifactPolicy;
use exceptions::{HighRiskTriggers, InlineBashAllowlist, UnsafePatternAllowlist};
use permissions::PermissionsBaseline;
use rules::RootPolicy;
use unsafe_patterns::UnsafePatternsPolicy;

pub mod unsafe_patterns;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{label} config not found at {path}")]
    NotFound { label: &'static str, path: String },
    #[error("{label} config at {path} is not valid YAML: {source}")]
    Syntax {
        label: &'static str,
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{label} config at {path} is empty")]
    Empty { label: &'static str, path: String },
    #[error("{label} config at {path} must be a YAML mapping")]
    NotAMapping { label: &'static str, path: String },
    #[error("{label} config at {path} is missing required key '{key}'")]
    MissingKey {
        label: &'static str,
        path: String,
        key: &'static str,
    },
}

/// All eight policy tables, immutable after load and shared (read-only)
/// across concurrently-checked workflows.
pub struct PolicySet {
    pub root: RootPolicy,
    pub allowed_actions: AllowedActions,
    pub unsafe_patterns: UnsafePatternsPolicy,
    pub unsafe_pattern_allowlist: UnsafePatternAllowlist,
    pub inline_bash_allowlist: InlineBashAllowlist,
    pub high_risk_triggers: HighRiskTriggers,
    pub permissions_baseline: PermissionsBaseline,
    pub artifact_policy: ArtifactPolicy,
}

struct FileSpec {
    label: &'static str,
    relative_path: &'static str,
    required_keys: &'static [&'static str],
}

const FILES: &[FileSpec] = &[
    FileSpec {
        label: "root policy",
        relative_path: "configs/ci/policies/validate-ci.yml",
        required_keys: &["rules"],
    },
    FileSpec {
        label: "actions allowlist",
        relative_path: "configs/ci/exceptions/actions-allowlist.yml",
        required_keys: &["allowlist"],
    },
    FileSpec {
        label: "unsafe patterns",
        relative_path: "configs/ci/policies/unsafe-patterns.yml",
        required_keys: &["patterns"],
    },
    FileSpec {
        label: "unsafe patterns allowlist",
        relative_path: "configs/ci/exceptions/unsafe-patterns-allowlist.yml",
        required_keys: &["allowlist"],
    },
    FileSpec {
        label: "inline bash allowlist",
        relative_path: "configs/ci/exceptions/inline-bash-allowlist.yml",
        required_keys: &["allowlist"],
    },
    FileSpec {
        label: "high-risk triggers allowlist",
        relative_path: "configs/ci/exceptions/high-risk-triggers-allowlist.yml",
        required_keys: &["high_risk_triggers", "allowlist"],
    },
    FileSpec {
        label: "permissions baseline",
        relative_path: "configs/ci/policies/permissions-baseline.yml",
        required_keys: &["workflows"],
    },
    FileSpec {
        label: "artifact policy",
        relative_path: "configs/ci/policies/artifact-policy.yml",
        required_keys: &["allowlist"],
    },
];

/// Reads and structurally validates a single policy file, returning its
/// parsed [`serde_yaml::Value`] for further typed deserialization by the
/// caller.
fn load_raw(platform_root: &Utf8Path, spec: &FileSpec) -> Result<serde_yaml::Value, PolicyError> {
    load_raw_at(&platform_root.join(spec.relative_path), spec)
}

fn load_raw_at(path: &Utf8Path, spec: &FileSpec) -> Result<serde_yaml::Value, PolicyError> {
    let contents = fs::read_to_string(path).map_err(|_| PolicyError::NotFound {
        label: spec.label,
        path: path.to_string(),
    })?;

    if contents.trim().is_empty() {
        return Err(PolicyError::Empty {
            label: spec.label,
            path: path.to_string(),
        });
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|source| PolicyError::Syntax {
            label: spec.label,
            path: path.to_string(),
            source,
        })?;

    if !value.is_mapping() {
        return Err(PolicyError::NotAMapping {
            label: spec.label,
            path: path.to_string(),
        });
    }

    for key in spec.required_keys {
        if value.get(key).is_none() {
            return Err(PolicyError::MissingKey {
                label: spec.label,
                path: path.to_string(),
                key,
            });
        }
    }

    Ok(value)
}

fn typed<T: serde::de::DeserializeOwned>(
    value: serde_yaml::Value,
    spec: &FileSpec,
) -> Result<T, PolicyError> {
    serde_yaml::from_value(value).map_err(|source| PolicyError::Syntax {
        label: spec.label,
        path: spec.relative_path.to_string(),
        source,
    })
}

/// Loads all eight policy tables from `<platform_root>/configs/ci/`.
///
/// `root_override`, when set, replaces only the root policy file's path
/// (the `--config`/`PS_VALIDATE_CI_CONFIG` override); the other seven
/// files are still resolved under `platform_root` as usual.
pub fn load_all(
    platform_root: &Utf8Path,
    root_override: Option<&Utf8Path>,
) -> Result<PolicySet, PolicyError> {
    let root_value = match root_override {
        Some(path) => load_raw_at(path, &FILES[0])?,
        None => load_raw(platform_root, &FILES[0])?,
    };
    let root: RootPolicy = typed(root_value, &FILES[0])?;

    let allow_value = load_raw(platform_root, &FILES[1])?;
    let allowed_actions =
        AllowedActions::from_raw(typed(allow_value, &FILES[1])?);

    let patterns_value = load_raw(platform_root, &FILES[2])?;
    let unsafe_patterns = UnsafePatternsPolicy::from_raw(typed(patterns_value, &FILES[2])?);

    let upa_value = load_raw(platform_root, &FILES[3])?;
    let unsafe_pattern_allowlist =
        UnsafePatternAllowlist::from_raw(typed(upa_value, &FILES[3])?);

    let iba_value = load_raw(platform_root, &FILES[4])?;
    let inline_bash_allowlist = InlineBashAllowlist::from_raw(typed(iba_value, &FILES[4])?);

    let hrt_value = load_raw(platform_root, &FILES[5])?;
    let high_risk_triggers = HighRiskTriggers::from_raw(typed(hrt_value, &FILES[5])?);

    let perms_value = load_raw(platform_root, &FILES[6])?;
    let permissions_baseline = PermissionsBaseline::from_raw(typed(perms_value, &FILES[6])?);

    let artifact_value = load_raw(platform_root, &FILES[7])?;
    let artifact_policy = ArtifactPolicy::from_raw(typed(artifact_value, &FILES[7])?);

    Ok(PolicySet {
        root,
        allowed_actions,
        unsafe_patterns,
        unsafe_pattern_allowlist,
        inline_bash_allowlist,
        high_risk_triggers,
        permissions_baseline,
        artifact_policy,
    })
}
