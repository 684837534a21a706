//! The scorer and report writer (§4.6): turns the accumulated violation
//! list into a numeric score and a stable JSON artifact, plus the
//! human-readable stderr summary printed on failure.

use std::fs;

use anstream::eprintln;
use camino::Utf8Path;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::violation::Violation;

#[derive(Serialize)]
pub struct Report {
    pub score: u32,
    #[serde(rename = "deductionPercent")]
    pub deduction_percent: u32,
    #[serde(rename = "totalWeight")]
    pub total_weight: u32,
    pub threshold: Option<u32>,
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn compute(violations: Vec<Violation>, threshold: Option<u32>) -> Self {
        let total_weight: u32 = violations.iter().map(|v| v.weight).sum();
        let deduction_percent = (total_weight.saturating_mul(10)).min(100);
        let score = 100u32.saturating_sub(deduction_percent);

        Self {
            score,
            deduction_percent,
            total_weight,
            threshold,
            violations,
        }
    }

    /// The run fails iff there is at least one violation, or a configured
    /// score threshold has been breached.
    pub fn failed(&self) -> bool {
        !self.violations.is_empty() || self.threshold.is_some_and(|t| self.score < t)
    }

    /// Writes the JSON report to `path`. Per §7, a write failure here is
    /// logged and swallowed rather than propagated: a read-only filesystem
    /// must not be able to mask a passing run.
    pub fn write_to(&self, path: &Utf8Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::warn!("could not create report directory {parent}: {e}");
                return;
            }
        }
        match serde_json::to_vec_pretty(self) {
            Ok(bytes) => {
                if let Err(e) = fs::write(path, bytes) {
                    tracing::warn!("could not write report to {path}: {e}");
                }
            }
            Err(e) => tracing::warn!("could not serialize report: {e}"),
        }
    }

    /// Prints every violation, then the score summary, to stderr.
    pub fn print_failure_summary(&self) {
        for violation in &self.violations {
            eprintln!("{}", violation.to_string().red());
        }
        eprintln!(
            "{}",
            format!(
                "score: {} (deduction {}%, total weight {})",
                self.score, self.deduction_percent, self.total_weight
            )
            .yellow()
        );
    }

    pub fn print_success_summary(&self) {
        eprintln!("{}", "passed".green());
    }
}
