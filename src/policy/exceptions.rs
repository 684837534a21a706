//! The selector-based exception tables: unsafe-pattern allowlist,
//! inline-bash allowlist (with constraints), and high-risk-trigger
//! allowlist.

use std::collections::HashMap;

use serde::Deserialize;

use super::selector::{Selector, StepContext};

fn is_active(status: &Option<String>) -> bool {
    status.as_deref().map(|s| s == "active").unwrap_or(true)
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExceptionEntry {
    pub id: String,
    pub status: Option<String>,
    pub selector: Selector,
}

#[derive(Debug, Deserialize)]
pub struct RawExceptionFile {
    pub allowlist: Vec<ExceptionEntry>,
}

#[derive(Debug, Default)]
pub struct UnsafePatternAllowlist {
    entries: Vec<ExceptionEntry>,
}

impl UnsafePatternAllowlist {
    pub fn from_raw(raw: RawExceptionFile) -> Self {
        Self {
            entries: raw.entries_active(),
        }
    }

    pub fn suppresses(&self, pattern_id: &str, ctx: &StepContext<'_>) -> bool {
        self.entries
            .iter()
            .any(|e| e.id == pattern_id && e.selector.matches(ctx))
    }
}

impl RawExceptionFile {
    fn entries_active(self) -> Vec<ExceptionEntry> {
        self.allowlist
            .into_iter()
            .filter(|e| is_active(&e.status))
            .collect()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InlineConstraints {
    #[serde(default)]
    pub forbid_regex: Vec<String>,
    #[serde(default)]
    pub require_contains: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawConstraintsBlock {
    #[serde(default)]
    pub global: InlineConstraints,
    #[serde(default)]
    pub forbid: ForbidBlock,
    #[serde(default)]
    pub require: RequireBlock,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ForbidBlock {
    #[serde(default)]
    pub run_regex: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RequireBlock {
    #[serde(default)]
    pub run_contains_all: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawInlineBashFile {
    pub allowlist: Vec<ExceptionEntry>,
    #[serde(default)]
    pub constraints: RawConstraintsBlock,
}

#[derive(Debug, Default)]
pub struct InlineBashAllowlist {
    entries: Vec<ExceptionEntry>,
    pub constraints: InlineConstraints,
}

impl InlineBashAllowlist {
    pub fn from_raw(raw: RawInlineBashFile) -> Self {
        let mut constraints = raw.constraints.global.clone();
        constraints
            .forbid_regex
            .extend(raw.constraints.forbid.run_regex.clone());
        constraints
            .require_contains
            .extend(raw.constraints.require.run_contains_all.clone());

        Self {
            entries: raw
                .allowlist
                .into_iter()
                .filter(|e| is_active(&e.status))
                .collect(),
            constraints,
        }
    }

    pub fn covers(&self, ctx: &StepContext<'_>) -> bool {
        self.entries.iter().any(|e| e.selector.matches(ctx))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TriggerAllowlistEntry {
    pub workflow: String,
    pub trigger: String,
}

#[derive(Debug, Deserialize)]
pub struct RawHighRiskTriggersFile {
    pub high_risk_triggers: Vec<String>,
    pub allowlist: Vec<TriggerAllowlistEntry>,
}

#[derive(Debug, Default)]
pub struct HighRiskTriggers {
    pub triggers: std::collections::HashSet<String>,
    allowlist: HashMap<String, std::collections::HashSet<String>>,
}

impl HighRiskTriggers {
    pub fn from_raw(raw: RawHighRiskTriggersFile) -> Self {
        let mut allowlist: HashMap<String, std::collections::HashSet<String>> = HashMap::new();
        for entry in raw.allowlist {
            allowlist
                .entry(entry.trigger)
                .or_default()
                .insert(entry.workflow);
        }
        Self {
            triggers: raw.high_risk_triggers.into_iter().collect(),
            allowlist,
        }
    }

    pub fn is_high_risk(&self, trigger: &str) -> bool {
        self.triggers.contains(trigger)
    }

    pub fn is_allowlisted(&self, trigger: &str, workflow_relative_path: &str) -> bool {
        self.allowlist
            .get(trigger)
            .map(|paths| paths.contains(workflow_relative_path))
            .unwrap_or(false)
    }
}
