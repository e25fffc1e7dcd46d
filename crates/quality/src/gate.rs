//! The gate seam shared by in-process and external gates.

use std::collections::BTreeMap;

use async_trait::async_trait;
use gatekeeper_core::{GateResult, InputError};
use serde_json::Value;

/// Gate names, in orchestrator order.
pub mod names {
    /// Package manifest and placeholder checks
    pub const STRUCTURAL: &str = "structural";
    /// Fixture coverage audit
    pub const FIXTURE_BALANCE: &str = "fixture-balance";
    /// Classifier metrics
    pub const QUANTITATIVE: &str = "quantitative-eval";
    /// Canary log audit
    pub const CANARY: &str = "canary";
    /// Human attestation
    pub const SIGNOFF: &str = "human-signoff";
}

/// One evidence gate.
///
/// A gate never fails the run: malformed input becomes an unevaluable
/// result, so the orchestrator always gets a [`GateResult`].
#[async_trait]
pub trait Gate: Send + Sync {
    /// Name shown in the report.
    fn name(&self) -> &str;

    /// Load inputs, evaluate, and describe the outcome.
    async fn run(&self) -> GateResult;
}

/// Aggregated output of an in-process evaluator.
pub trait Evaluation {
    /// Metrics for the report.
    fn summary(&self) -> BTreeMap<String, Value>;

    /// Soft failures, in check order.
    fn failures(&self) -> &[String];

    /// Diagnostic text.
    fn render(&self) -> String;
}

/// Turn an evaluator outcome into a gate result.
pub fn conclude<E: Evaluation>(name: &str, outcome: Result<E, InputError>, enforce: bool) -> GateResult {
    match outcome {
        Ok(report) => {
            let failures = report.failures().to_vec();
            let mut output = report.render();
            if !failures.is_empty() && !enforce {
                output.push_str("\nFailures reported without enforcement; exit status 0.\n");
            }
            let result = GateResult::evaluated(name, report.summary(), failures, output, enforce);
            tracing::info!(
                "Gate {}: {} ({} failures)",
                name,
                result.status_label(),
                result.failures.len()
            );
            result
        }
        Err(e) => {
            tracing::warn!("Gate {} could not evaluate its inputs: {}", name, e);
            GateResult::unevaluable(name, e)
        }
    }
}

/// `PASS` or `FAIL` line used at the end of evaluator reports.
pub(crate) fn verdict_line(label: &str, failures: &[String]) -> String {
    let mut out = format!("{}: {}\n", label, if failures.is_empty() { "PASS" } else { "FAIL" });
    for failure in failures {
        out.push_str(&format!("- {}\n", failure));
    }
    out
}
