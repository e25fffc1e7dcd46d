//! Gate outcomes and the aggregate release decision.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one gate invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    /// Gate name
    pub name: String,

    /// Whether the gate passed
    pub passed: bool,

    /// Metrics, ordered by key
    pub summary: BTreeMap<String, serde_json::Value>,

    /// Violations, in evaluation order
    pub failures: Vec<String>,

    /// Diagnostic text as a human would read it
    pub output: String,

    /// Exit status the gate would report on its own
    pub exit_code: i32,

    /// Set when the gate could not evaluate its inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GateResult {
    /// A gate that evaluated well-formed input.
    ///
    /// Passes iff `failures` is empty. The exit status is nonzero only when
    /// failures exist and `enforce` is set.
    pub fn evaluated(
        name: impl Into<String>,
        summary: BTreeMap<String, serde_json::Value>,
        failures: Vec<String>,
        output: impl Into<String>,
        enforce: bool,
    ) -> Self {
        let passed = failures.is_empty();
        Self {
            name: name.into(),
            passed,
            summary,
            failures,
            output: output.into(),
            exit_code: if !passed && enforce { 1 } else { 0 },
            error: None,
        }
    }

    /// A gate that aborted on malformed input. Never passes, always exits 1.
    pub fn unevaluable(name: impl Into<String>, error: impl fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            name: name.into(),
            passed: false,
            summary: BTreeMap::new(),
            failures: vec![format!("Unable to evaluate: {}", error)],
            output: format!("Error: {}", error),
            exit_code: 1,
            error: Some(error),
        }
    }

    /// `PASS` or `FAIL`.
    pub fn status_label(&self) -> &'static str {
        if self.passed {
            "PASS"
        } else {
            "FAIL"
        }
    }

    /// Whether the gate hit a hard error rather than soft failures.
    pub fn is_unevaluable(&self) -> bool {
        self.error.is_some()
    }
}

/// GO / NO-GO verdict derived from gate results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseDecision {
    /// Every gate passed
    Go,
    /// At least one gate did not pass
    NoGo {
        /// Failing gates, in gate order
        blockers: Vec<String>,
    },
}

impl ReleaseDecision {
    /// Logical AND over all results.
    pub fn from_results(results: &[GateResult]) -> Self {
        let blockers: Vec<String> = results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.name.clone())
            .collect();
        if blockers.is_empty() {
            ReleaseDecision::Go
        } else {
            ReleaseDecision::NoGo { blockers }
        }
    }

    /// Whether the release may proceed.
    pub fn is_go(&self) -> bool {
        matches!(self, ReleaseDecision::Go)
    }

    /// Failing gate names; empty on GO.
    pub fn blockers(&self) -> &[String] {
        match self {
            ReleaseDecision::Go => &[],
            ReleaseDecision::NoGo { blockers } => blockers,
        }
    }

    /// `GO` or `NO-GO`.
    pub fn label(&self) -> &'static str {
        match self {
            ReleaseDecision::Go => "GO",
            ReleaseDecision::NoGo { .. } => "NO-GO",
        }
    }

    /// Process exit status for calling automation.
    pub fn exit_code(&self) -> u8 {
        if self.is_go() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for ReleaseDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing(name: &str) -> GateResult {
        GateResult::evaluated(name, BTreeMap::new(), Vec::new(), "ok", true)
    }

    #[test]
    fn test_evaluated_without_enforce_keeps_zero_exit() {
        let result = GateResult::evaluated("canary", BTreeMap::new(), vec!["x".to_string()], "", false);
        assert!(!result.passed);
        assert_eq!(result.exit_code, 0);

        let enforced = GateResult::evaluated("canary", BTreeMap::new(), vec!["x".to_string()], "", true);
        assert_eq!(enforced.exit_code, 1);
    }

    #[test]
    fn test_unevaluable_result() {
        let result = GateResult::unevaluable("quantitative-eval", "Missing required field(s) id at f.jsonl:2");
        assert!(!result.passed);
        assert!(result.is_unevaluable());
        assert_eq!(result.exit_code, 1);
        assert!(result.output.starts_with("Error: "));
        assert_eq!(result.status_label(), "FAIL");
    }

    #[test]
    fn test_decision_is_logical_and() {
        assert_eq!(ReleaseDecision::from_results(&[]), ReleaseDecision::Go);
        assert!(ReleaseDecision::from_results(&[passing("a"), passing("b")]).is_go());

        let failing = GateResult::unevaluable("b", "broken");
        let decision = ReleaseDecision::from_results(&[passing("a"), failing]);
        assert_eq!(decision.label(), "NO-GO");
        assert_eq!(decision.blockers(), &["b".to_string()]);
        assert_eq!(decision.exit_code(), 1);
    }
}
