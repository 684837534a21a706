//! `configs/ci/policies/validate-ci.yml`, the master rule container.

use serde::Deserialize;

fn default_max_inline_lines() -> usize {
    30
}

#[derive(Clone, Debug, Deserialize)]
pub struct InlineBashRuleConfig {
    #[serde(default = "default_max_inline_lines")]
    pub max_inline_lines: usize,
}

impl Default for InlineBashRuleConfig {
    fn default() -> Self {
        Self {
            max_inline_lines: default_max_inline_lines(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OutputsAndArtifactsConfig {
    #[serde(default)]
    pub require_section_headers: bool,
}

fn default_hardened_runner_prefix() -> Vec<String> {
    vec!["step-security/harden-runner@".to_string()]
}

#[derive(Clone, Debug, Deserialize)]
pub struct RunnerHardeningConfig {
    #[serde(default = "default_hardened_runner_prefix")]
    pub allowed_first_steps: Vec<String>,
}

impl Default for RunnerHardeningConfig {
    fn default() -> Self {
        Self {
            allowed_first_steps: default_hardened_runner_prefix(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub inline_bash: InlineBashRuleConfig,
    #[serde(default)]
    pub outputs_and_artifacts: OutputsAndArtifactsConfig,
    #[serde(default)]
    pub runner_hardening: RunnerHardeningConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EnforcementConfig {
    pub score_fail_threshold: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RootPolicy {
    pub rules: RulesConfig,
    #[serde(default)]
    pub enforcement: EnforcementConfig,
}
