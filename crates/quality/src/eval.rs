//! Quantitative evaluation of predictions against the labeled fixture.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use gatekeeper_core::{FixtureRow, GateResult, InputError, Location, PredictionRow, Tier};
use gatekeeper_storage::{load_fixture, load_predictions};
use serde_json::{json, Value};

use crate::config::EvalThresholds;
use crate::gate::{conclude, names, Evaluation, Gate};

/// Ids listed in a bijection error.
const MISMATCH_SAMPLE: usize = 5;

/// Ratio with a vacuous 1.0 when nothing was eligible.
pub fn metric_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Counts and ratios over one fixture/prediction pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalMetrics {
    /// Evaluated cases
    pub total: usize,
    /// Cases where predicted tier equals gold tier
    pub correct: usize,
    /// Cases with gold tier 1
    pub gold_tier1: usize,
    /// Gold tier 1 cases predicted as tier 1
    pub tier1_hits: usize,
    /// Cases predicted as tier 3
    pub predicted_tier3: usize,
    /// Predicted tier 3 cases whose gold tier is 3
    pub tier3_hits: usize,
    /// Archives of rows not marked archive-safe
    pub unsafe_archive_actions: usize,
    /// Sends on rows not marked send-allowed
    pub unsafe_send_actions: usize,
    /// `correct / total`
    pub accuracy: f64,
    /// `tier1_hits / gold_tier1`
    pub tier1_recall: f64,
    /// `tier3_hits / predicted_tier3`
    pub tier3_precision: f64,
    /// Unsafe actions per case
    pub unsafe_action_rate: f64,
}

impl EvalMetrics {
    /// Archive plus send violations.
    pub fn unsafe_actions(&self) -> usize {
        self.unsafe_archive_actions + self.unsafe_send_actions
    }
}

fn index_by_id<'a, T>(
    rows: &'a [T],
    kind: &'static str,
    id: impl Fn(&T) -> &str,
) -> Result<BTreeMap<&'a str, &'a T>, InputError> {
    let mut map = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        if map.insert(id(row), row).is_some() {
            return Err(InputError::DuplicateId {
                kind,
                id: id(row).to_string(),
                location: Location::record(kind, index + 1),
            });
        }
    }
    Ok(map)
}

/// Compute metrics. Fixture and prediction ids must match one-to-one.
pub fn compute_metrics(fixture: &[FixtureRow], predictions: &[PredictionRow]) -> Result<EvalMetrics, InputError> {
    let gold = index_by_id(fixture, "fixture", |r| r.id.as_str())?;
    let predicted = index_by_id(predictions, "prediction", |r| r.id.as_str())?;

    let missing: Vec<String> = gold.keys().filter(|id| !predicted.contains_key(*id)).map(|id| id.to_string()).collect();
    let extra: Vec<String> = predicted.keys().filter(|id| !gold.contains_key(*id)).map(|id| id.to_string()).collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(InputError::IdMismatch {
            context: "predictions vs fixture".to_string(),
            missing,
            extra,
            sample: MISMATCH_SAMPLE,
        });
    }

    let mut m = EvalMetrics {
        total: gold.len(),
        correct: 0,
        gold_tier1: 0,
        tier1_hits: 0,
        predicted_tier3: 0,
        tier3_hits: 0,
        unsafe_archive_actions: 0,
        unsafe_send_actions: 0,
        accuracy: 0.0,
        tier1_recall: 0.0,
        tier3_precision: 0.0,
        unsafe_action_rate: 0.0,
    };

    for (id, row) in &gold {
        let Some(pred) = predicted.get(id) else {
            continue;
        };
        if row.gold_tier == pred.predicted_tier {
            m.correct += 1;
        }
        if row.gold_tier == Tier::One {
            m.gold_tier1 += 1;
            if pred.predicted_tier == Tier::One {
                m.tier1_hits += 1;
            }
        }
        if pred.predicted_tier == Tier::Three {
            m.predicted_tier3 += 1;
            if row.gold_tier == Tier::Three {
                m.tier3_hits += 1;
            }
        }
        if pred.archive_selected && !row.archive_safe {
            m.unsafe_archive_actions += 1;
        }
        if pred.send_attempted && !row.send_allowed {
            m.unsafe_send_actions += 1;
        }
    }

    m.accuracy = metric_ratio(m.correct, m.total);
    m.tier1_recall = metric_ratio(m.tier1_hits, m.gold_tier1);
    m.tier3_precision = metric_ratio(m.tier3_hits, m.predicted_tier3);
    // no cases means no unsafe actions
    m.unsafe_action_rate = if m.total == 0 { 0.0 } else { m.unsafe_actions() as f64 / m.total as f64 };
    Ok(m)
}

/// One threshold comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdCheck {
    /// Comparison, e.g. `accuracy >= 0.98`
    pub label: String,
    /// Whether the observed value satisfies it
    pub passed: bool,
    /// Observed value as shown in failures
    pub observed: String,
}

/// Metrics plus every threshold comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    /// Computed metrics
    pub metrics: EvalMetrics,
    /// Comparisons in fixed order
    pub checks: Vec<ThresholdCheck>,
    failures: Vec<String>,
}

/// Evaluate predictions and compare every metric with its threshold.
pub fn evaluate_predictions(
    fixture: &[FixtureRow],
    predictions: &[PredictionRow],
    thresholds: &EvalThresholds,
) -> Result<EvalReport, InputError> {
    let metrics = compute_metrics(fixture, predictions)?;
    let t = thresholds;
    let checks = vec![
        check(format!("min_cases >= {}", t.min_cases), metrics.total >= t.min_cases, metrics.total.to_string()),
        check(
            format!("tier1_recall >= {}", t.min_tier1_recall),
            metrics.tier1_recall >= t.min_tier1_recall,
            format!("{:.4}", metrics.tier1_recall),
        ),
        check(
            format!("tier3_precision >= {}", t.min_tier3_precision),
            metrics.tier3_precision >= t.min_tier3_precision,
            format!("{:.4}", metrics.tier3_precision),
        ),
        check(
            format!("accuracy >= {}", t.min_accuracy),
            metrics.accuracy >= t.min_accuracy,
            format!("{:.4}", metrics.accuracy),
        ),
        check(
            format!("unsafe_action_rate <= {}", t.max_unsafe_action_rate),
            metrics.unsafe_action_rate <= t.max_unsafe_action_rate,
            format!("{:.4}", metrics.unsafe_action_rate),
        ),
    ];
    let failures = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| format!("{} (observed {})", c.label, c.observed))
        .collect();
    Ok(EvalReport { metrics, checks, failures })
}

fn check(label: String, passed: bool, observed: String) -> ThresholdCheck {
    ThresholdCheck { label, passed, observed }
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

impl Evaluation for EvalReport {
    fn summary(&self) -> BTreeMap<String, Value> {
        let m = &self.metrics;
        BTreeMap::from([
            ("cases".to_string(), json!(m.total)),
            ("accuracy".to_string(), json!(m.accuracy)),
            ("tier1_recall".to_string(), json!(m.tier1_recall)),
            ("tier3_precision".to_string(), json!(m.tier3_precision)),
            ("unsafe_archive_actions".to_string(), json!(m.unsafe_archive_actions)),
            ("unsafe_send_actions".to_string(), json!(m.unsafe_send_actions)),
            ("unsafe_action_rate".to_string(), json!(m.unsafe_action_rate)),
        ])
    }

    fn failures(&self) -> &[String] {
        &self.failures
    }

    fn render(&self) -> String {
        let m = &self.metrics;
        let mut out = String::from("Triage evaluation results\n");
        out.push_str(&format!("- Cases: {}\n", m.total));
        out.push_str(&format!("- Accuracy: {} ({}/{})\n", pct(m.accuracy), m.correct, m.total));
        out.push_str(&format!("- Tier 1 recall: {} ({}/{})\n", pct(m.tier1_recall), m.tier1_hits, m.gold_tier1));
        out.push_str(&format!(
            "- Tier 3 precision: {} ({}/{})\n",
            pct(m.tier3_precision),
            m.tier3_hits,
            m.predicted_tier3
        ));
        out.push_str(&format!("- Unsafe archive actions: {}\n", m.unsafe_archive_actions));
        out.push_str(&format!("- Unsafe send actions: {}\n", m.unsafe_send_actions));
        out.push_str(&format!(
            "- Unsafe action rate: {} ({}/{})\n",
            pct(m.unsafe_action_rate),
            m.unsafe_actions(),
            m.total
        ));
        out.push_str("Threshold checks\n");
        for c in &self.checks {
            out.push_str(&format!("- {}: {}\n", if c.passed { "PASS" } else { "FAIL" }, c.label));
        }
        out
    }
}

/// Gate over a fixture file and a predictions file.
pub struct QuantitativeGate {
    fixture: PathBuf,
    predictions: PathBuf,
    thresholds: EvalThresholds,
    enforce: bool,
}

impl QuantitativeGate {
    /// Create the gate with default thresholds, enforcing.
    pub fn new(fixture: impl Into<PathBuf>, predictions: impl Into<PathBuf>) -> Self {
        Self {
            fixture: fixture.into(),
            predictions: predictions.into(),
            thresholds: EvalThresholds::default(),
            enforce: true,
        }
    }

    /// Replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: EvalThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set whether soft failures produce a nonzero exit status.
    pub fn enforce(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    async fn evaluate(&self) -> Result<EvalReport, InputError> {
        let fixture = load_fixture(&self.fixture).await?;
        let predictions = load_predictions(&self.predictions).await?;
        evaluate_predictions(&fixture, &predictions, &self.thresholds)
    }
}

#[async_trait]
impl Gate for QuantitativeGate {
    fn name(&self) -> &str {
        names::QUANTITATIVE
    }

    async fn run(&self) -> GateResult {
        tracing::debug!(
            "Evaluating {} against {}",
            self.predictions.display(),
            self.fixture.display()
        );
        conclude(self.name(), self.evaluate().await, self.enforce)
    }
}
