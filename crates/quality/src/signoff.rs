//! Human sign-off verification.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use gatekeeper_core::{GateResult, SignoffAttestation};
use gatekeeper_storage::load_signoff;
use serde_json::{json, Value};

use crate::config::SignoffThresholds;
use crate::gate::{conclude, names, verdict_line, Evaluation, Gate};

/// A checked attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignoffReport {
    /// The attestation as loaded
    pub attestation: SignoffAttestation,
    failures: Vec<String>,
}

/// Check an attestation. Every violated field is reported on its own.
pub fn verify_signoff(attestation: &SignoffAttestation, thresholds: &SignoffThresholds) -> SignoffReport {
    let a = attestation;
    let mut failures = Vec::new();
    if a.transcript_review_count < thresholds.min_reviews {
        failures.push(format!(
            "Transcript reviews {} is below required minimum {}",
            a.transcript_review_count, thresholds.min_reviews
        ));
    }
    for (key, approved) in [
        ("voice_quality_approved", a.voice_quality_approved),
        ("archive_clarity_approved", a.archive_clarity_approved),
    ] {
        if !approved {
            failures.push(format!("{} is false", key));
        }
    }
    for (key, value) in [("approved_by", &a.approved_by), ("approved_at", &a.approved_at)] {
        if value.trim().is_empty() {
            failures.push(format!("{} is empty", key));
        }
    }
    SignoffReport { attestation: attestation.clone(), failures }
}

impl Evaluation for SignoffReport {
    fn summary(&self) -> BTreeMap<String, Value> {
        let a = &self.attestation;
        BTreeMap::from([
            ("eric_transcript_reviews".to_string(), json!(a.transcript_review_count)),
            ("voice_quality_approved".to_string(), json!(a.voice_quality_approved)),
            ("archive_clarity_approved".to_string(), json!(a.archive_clarity_approved)),
            ("approved_by".to_string(), json!(a.approved_by)),
            ("approved_at".to_string(), json!(a.approved_at)),
        ])
    }

    fn failures(&self) -> &[String] {
        &self.failures
    }

    fn render(&self) -> String {
        let a = &self.attestation;
        let mut out = String::from("Human sign-off report\n");
        out.push_str(&format!("- Transcript reviews: {}\n", a.transcript_review_count));
        out.push_str(&format!("- Voice quality approved: {}\n", a.voice_quality_approved));
        out.push_str(&format!("- Archive clarity approved: {}\n", a.archive_clarity_approved));
        out.push_str(&format!("- Approved by: {}\n", a.approved_by));
        out.push_str(&format!("- Approved at: {}\n", a.approved_at));
        out.push_str(&verdict_line("Human sign-off checks", &self.failures));
        out
    }
}

/// Gate over a sign-off file.
pub struct SignoffGate {
    signoff: PathBuf,
    thresholds: SignoffThresholds,
    enforce: bool,
}

impl SignoffGate {
    /// Create the gate with default thresholds, enforcing.
    pub fn new(signoff: impl Into<PathBuf>) -> Self {
        Self { signoff: signoff.into(), thresholds: SignoffThresholds::default(), enforce: true }
    }

    /// Replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: SignoffThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set whether soft failures produce a nonzero exit status.
    pub fn enforce(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }
}

#[async_trait]
impl Gate for SignoffGate {
    fn name(&self) -> &str {
        names::SIGNOFF
    }

    async fn run(&self) -> GateResult {
        tracing::debug!("Verifying sign-off {}", self.signoff.display());
        let outcome = load_signoff(&self.signoff)
            .await
            .map(|attestation| verify_signoff(&attestation, &self.thresholds));
        conclude(self.name(), outcome, self.enforce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved() -> SignoffAttestation {
        SignoffAttestation {
            transcript_review_count: 3,
            voice_quality_approved: true,
            archive_clarity_approved: true,
            approved_by: "Release lead".to_string(),
            approved_at: "2026-02-20T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_complete_signoff_passes() {
        let report = verify_signoff(&approved(), &SignoffThresholds::default());
        assert!(report.failures().is_empty());
        assert!(report.render().ends_with("Human sign-off checks: PASS\n"));
    }

    #[test]
    fn test_four_violations_reported_individually() {
        let attestation = SignoffAttestation {
            transcript_review_count: 1,
            voice_quality_approved: false,
            archive_clarity_approved: false,
            approved_by: "   ".to_string(),
            ..approved()
        };
        let report = verify_signoff(&attestation, &SignoffThresholds { min_reviews: 3 });
        assert_eq!(
            report.failures(),
            &[
                "Transcript reviews 1 is below required minimum 3".to_string(),
                "voice_quality_approved is false".to_string(),
                "archive_clarity_approved is false".to_string(),
                "approved_by is empty".to_string(),
            ]
        );
    }

    #[test]
    fn test_each_blank_string_reported() {
        let attestation = SignoffAttestation {
            transcript_review_count: 1,
            voice_quality_approved: false,
            archive_clarity_approved: false,
            approved_by: String::new(),
            approved_at: " ".to_string(),
        };
        let report = verify_signoff(&attestation, &SignoffThresholds { min_reviews: 3 });
        assert_eq!(report.failures().len(), 5);
        assert_eq!(report.failures()[4], "approved_at is empty");
    }

    #[tokio::test]
    async fn test_gate_wrong_type_is_unevaluable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signoff.json");
        std::fs::write(
            &path,
            r#"{"eric_transcript_reviews": 3, "voice_quality_approved": "yes",
                "archive_clarity_approved": true, "approved_by": "a", "approved_at": "b"}"#,
        )
        .unwrap();
        let result = SignoffGate::new(&path).run().await;
        assert!(result.is_unevaluable());
        assert!(result.output.contains("voice_quality_approved"));
    }

    #[tokio::test]
    async fn test_gate_soft_failure_without_enforce() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signoff.json");
        std::fs::write(
            &path,
            r#"{"eric_transcript_reviews": 5, "voice_quality_approved": true,
                "archive_clarity_approved": false, "approved_by": "a", "approved_at": "b"}"#,
        )
        .unwrap();
        let result = SignoffGate::new(&path).enforce(false).run().await;
        assert!(!result.passed);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.failures, vec!["archive_clarity_approved is false"]);
        assert_eq!(result.summary["eric_transcript_reviews"], json!(5));
    }
}
