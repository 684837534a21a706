//! `configs/ci/policies/unsafe-patterns.yml`.

use std::collections::HashMap;

use serde::Deserialize;

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct UnsafePattern {
    pub id: String,
    pub uses: Option<String>,
    #[serde(default)]
    pub with: HashMap<String, String>,
    #[serde(default)]
    pub run_regex: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawUnsafePatternsFile {
    pub patterns: Vec<UnsafePattern>,
}

#[derive(Debug, Default)]
pub struct UnsafePatternsPolicy {
    pub patterns: Vec<UnsafePattern>,
}

impl UnsafePatternsPolicy {
    pub fn from_raw(raw: RawUnsafePatternsFile) -> Self {
        Self {
            patterns: raw.patterns.into_iter().filter(|p| p.enabled).collect(),
        }
    }
}
