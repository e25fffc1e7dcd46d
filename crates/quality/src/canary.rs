//! Canary log audit.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use gatekeeper_core::{CanaryRunRecord, GateResult, InputError, WindowQuery};
use gatekeeper_storage::load_canary_log;
use serde_json::{json, Value};

use crate::config::CanaryThresholds;
use crate::gate::{conclude, names, verdict_line, Evaluation, Gate};

/// Runs and windows seen on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayCoverage {
    /// Runs logged that day
    pub runs: usize,
    /// Distinct windows covered that day
    pub windows: BTreeSet<WindowQuery>,
}

impl DayCoverage {
    /// Required windows not covered, in identifier order.
    pub fn missing_windows(&self) -> Vec<WindowQuery> {
        WindowQuery::REQUIRED.iter().copied().filter(|w| !self.windows.contains(w)).collect()
    }
}

/// Aggregated canary evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanaryReport {
    /// Rows in the log
    pub total_runs: usize,
    /// Coverage per calendar day, ascending
    pub days: BTreeMap<NaiveDate, DayCoverage>,
    /// Runs flagged high volume
    pub high_volume_runs: usize,
    /// Runs with an unsafe action
    pub unsafe_actions: usize,
    /// Runs with a critical misarchive
    pub critical_misarchives: usize,
    /// Runs with a transport failure
    pub mcp_failures: usize,
    /// Runs that did not succeed
    pub unsuccessful_runs: usize,
    failures: Vec<String>,
}

/// Aggregate runs by day and check coverage and safety.
///
/// Per-day run count and window coverage are checked independently: a day
/// with two runs of the same window fails only the window check.
pub fn audit_canary(rows: &[CanaryRunRecord], thresholds: &CanaryThresholds) -> CanaryReport {
    let mut report = CanaryReport::default();
    if rows.is_empty() {
        report.failures.push("Canary log is empty".to_string());
        return report;
    }

    report.total_runs = rows.len();
    for row in rows {
        let day = report.days.entry(row.date).or_default();
        day.runs += 1;
        day.windows.insert(row.window_query);

        report.high_volume_runs += usize::from(row.high_volume);
        report.unsafe_actions += usize::from(row.unsafe_action);
        report.critical_misarchives += usize::from(row.critical_misarchive);
        report.mcp_failures += usize::from(row.mcp_failure);
        report.unsuccessful_runs += usize::from(!row.is_success);
    }

    let mut failures = Vec::new();
    if report.days.len() < thresholds.required_days {
        failures.push(format!(
            "Unique canary days {} is below required {}",
            report.days.len(),
            thresholds.required_days
        ));
    }
    for (date, day) in &report.days {
        if day.runs < thresholds.runs_per_day {
            failures.push(format!(
                "Day {} has {} runs but requires at least {}",
                date, day.runs, thresholds.runs_per_day
            ));
        }
        let missing = day.missing_windows();
        if !missing.is_empty() {
            let missing: Vec<&str> = missing.iter().map(|w| w.as_str()).collect();
            failures.push(format!("Day {} missing required windows: {}", date, missing.join(", ")));
        }
    }
    if report.high_volume_runs == 0 {
        failures.push("No high-volume run recorded (requires at least one run with 50+ emails)".to_string());
    }
    if report.unsafe_actions > 0 {
        failures.push(format!("Unsafe actions detected: {}", report.unsafe_actions));
    }
    if report.critical_misarchives > 0 {
        failures.push(format!("Critical misarchives detected: {}", report.critical_misarchives));
    }
    if report.mcp_failures > 0 {
        failures.push(format!("MCP failures detected: {}", report.mcp_failures));
    }
    if report.unsuccessful_runs > 0 {
        failures.push(format!("Unsuccessful runs detected: {}", report.unsuccessful_runs));
    }
    report.failures = failures;
    report
}

impl Evaluation for CanaryReport {
    fn summary(&self) -> BTreeMap<String, Value> {
        if self.total_runs == 0 {
            return BTreeMap::new();
        }
        BTreeMap::from([
            ("total_runs".to_string(), json!(self.total_runs)),
            ("unique_days".to_string(), json!(self.days.len())),
            ("high_volume_runs".to_string(), json!(self.high_volume_runs)),
            ("unsafe_actions".to_string(), json!(self.unsafe_actions)),
            ("critical_misarchives".to_string(), json!(self.critical_misarchives)),
            ("mcp_failures".to_string(), json!(self.mcp_failures)),
            ("unsuccessful_runs".to_string(), json!(self.unsuccessful_runs)),
        ])
    }

    fn failures(&self) -> &[String] {
        &self.failures
    }

    fn render(&self) -> String {
        let mut out = String::from("Canary evidence report\n");
        if self.total_runs > 0 {
            out.push_str(&format!("- Total runs: {}\n", self.total_runs));
            out.push_str(&format!("- Unique days: {}\n", self.days.len()));
            out.push_str(&format!("- High-volume runs: {}\n", self.high_volume_runs));
            out.push_str(&format!("- Unsafe actions: {}\n", self.unsafe_actions));
            out.push_str(&format!("- Critical misarchives: {}\n", self.critical_misarchives));
            out.push_str(&format!("- MCP failures: {}\n", self.mcp_failures));
            out.push_str(&format!("- Unsuccessful runs: {}\n", self.unsuccessful_runs));
        }
        out.push_str(&verdict_line("Canary checks", &self.failures));
        out
    }
}

/// Gate over a canary log file.
pub struct CanaryGate {
    log: PathBuf,
    thresholds: CanaryThresholds,
    enforce: bool,
}

impl CanaryGate {
    /// Create the gate with default thresholds, enforcing.
    pub fn new(log: impl Into<PathBuf>) -> Self {
        Self { log: log.into(), thresholds: CanaryThresholds::default(), enforce: true }
    }

    /// Replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: CanaryThresholds) -> Self {
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
impl Gate for CanaryGate {
    fn name(&self) -> &str {
        names::CANARY
    }

    async fn run(&self) -> GateResult {
        tracing::debug!("Auditing canary log {}", self.log.display());
        let outcome: Result<CanaryReport, InputError> =
            load_canary_log(&self.log).await.map(|rows| audit_canary(&rows, &self.thresholds));
        conclude(self.name(), outcome, self.enforce)
    }
}
