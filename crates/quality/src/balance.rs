//! Fixture coverage audit.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use gatekeeper_core::{FixtureRow, GateResult, InputError, Location, Tier};
use gatekeeper_storage::load_fixture;
use serde_json::{json, Value};

use crate::config::BalanceThresholds;
use crate::gate::{conclude, names, verdict_line, Evaluation, Gate};

/// Split a comma-separated tag list, dropping blanks.
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty()).map(String::from).collect()
}

/// Coverage counts for a fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    /// Fixture size
    pub total: usize,
    /// Rows per gold tier
    pub tier_counts: BTreeMap<Tier, usize>,
    /// Rows carrying each tag, counted once per row
    pub tag_counts: BTreeMap<String, usize>,
    /// Rows marked archive-safe
    pub archive_safe_true: usize,
    /// Rows not marked archive-safe
    pub archive_safe_false: usize,
    /// Tags that were checked, in configured order
    pub required_tags: Vec<String>,
    failures: Vec<String>,
}

impl BalanceReport {
    /// Rows carrying `tag`.
    pub fn tag_count(&self, tag: &str) -> usize {
        self.tag_counts.get(tag).copied().unwrap_or(0)
    }

    /// Rows with gold tier `tier`.
    pub fn tier_count(&self, tier: Tier) -> usize {
        self.tier_counts.get(&tier).copied().unwrap_or(0)
    }
}

fn check_rows(rows: &[FixtureRow]) -> Result<(), InputError> {
    let mut seen = HashSet::new();
    for (index, row) in rows.iter().enumerate() {
        let location = Location::record("fixture", index + 1);
        if !seen.insert(row.id.as_str()) {
            return Err(InputError::DuplicateId { kind: "fixture", id: row.id.clone(), location });
        }
        if row.scenario_tags.is_empty() || row.scenario_tags.iter().any(|t| t.trim().is_empty()) {
            return Err(InputError::Constraint {
                location,
                field: "scenario_tags".to_string(),
                expected: "a non-empty list of nonblank tags".to_string(),
                found: format!("{:?}", row.scenario_tags),
            });
        }
    }
    Ok(())
}

/// Count coverage and check it against the thresholds.
pub fn audit_fixture(rows: &[FixtureRow], thresholds: &BalanceThresholds) -> Result<BalanceReport, InputError> {
    check_rows(rows)?;

    let mut tier_counts: BTreeMap<Tier, usize> = Tier::ALL.iter().map(|t| (*t, 0)).collect();
    let mut tag_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut archive_safe_true = 0;
    for row in rows {
        *tier_counts.entry(row.gold_tier).or_default() += 1;
        if row.archive_safe {
            archive_safe_true += 1;
        }
        for tag in row.distinct_tags() {
            *tag_counts.entry(tag.to_string()).or_default() += 1;
        }
    }

    let mut report = BalanceReport {
        total: rows.len(),
        tier_counts,
        tag_counts,
        archive_safe_true,
        archive_safe_false: rows.len() - archive_safe_true,
        required_tags: thresholds.required_tags.clone(),
        failures: Vec::new(),
    };

    if report.total < thresholds.min_cases {
        report.failures.push(format!(
            "Case count {} is below required minimum {}",
            report.total, thresholds.min_cases
        ));
    }
    for tier in Tier::ALL {
        let count = report.tier_count(tier);
        if count < thresholds.min_tier_count {
            report.failures.push(format!(
                "Tier {} count {} is below required minimum {}",
                tier, count, thresholds.min_tier_count
            ));
        }
    }
    let uncovered: Vec<String> = thresholds
        .required_tags
        .iter()
        .filter(|tag| report.tag_count(tag) < thresholds.min_tag_count)
        .map(|tag| format!("{}({}/{})", tag, report.tag_count(tag), thresholds.min_tag_count))
        .collect();
    if !uncovered.is_empty() {
        report.failures.push(format!("Missing required tag coverage: {}", uncovered.join(", ")));
    }
    if report.archive_safe_true == 0 || report.archive_safe_false == 0 {
        report
            .failures
            .push("Fixture must include both archive_safe=true and archive_safe=false examples".to_string());
    }
    Ok(report)
}

impl Evaluation for BalanceReport {
    fn summary(&self) -> BTreeMap<String, Value> {
        let mut summary = BTreeMap::from([
            ("cases".to_string(), json!(self.total)),
            ("archive_safe_true".to_string(), json!(self.archive_safe_true)),
            ("archive_safe_false".to_string(), json!(self.archive_safe_false)),
        ]);
        for tier in Tier::ALL {
            summary.insert(format!("tier{}", tier), json!(self.tier_count(tier)));
        }
        summary.insert("tag_counts".to_string(), json!(self.tag_counts));
        summary
    }

    fn failures(&self) -> &[String] {
        &self.failures
    }

    fn render(&self) -> String {
        let mut out = String::from("Fixture balance report\n");
        out.push_str(&format!("- Cases: {}\n", self.total));
        out.push_str(&format!(
            "- Tier counts: T1={} T2={} T3={}\n",
            self.tier_count(Tier::One),
            self.tier_count(Tier::Two),
            self.tier_count(Tier::Three)
        ));
        out.push_str(&format!("- archive_safe=true: {}\n", self.archive_safe_true));
        out.push_str(&format!("- archive_safe=false: {}\n", self.archive_safe_false));
        for tag in &self.required_tags {
            out.push_str(&format!("- tag {}: {}\n", tag, self.tag_count(tag)));
        }
        out.push_str(&verdict_line("Balance checks", &self.failures));
        out
    }
}

/// Gate over a fixture file.
pub struct FixtureBalanceGate {
    fixture: PathBuf,
    thresholds: BalanceThresholds,
    enforce: bool,
}

impl FixtureBalanceGate {
    /// Create the gate with default thresholds, enforcing.
    pub fn new(fixture: impl Into<PathBuf>) -> Self {
        Self { fixture: fixture.into(), thresholds: BalanceThresholds::default(), enforce: true }
    }

    /// Replace the thresholds.
    pub fn with_thresholds(mut self, thresholds: BalanceThresholds) -> Self {
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
impl Gate for FixtureBalanceGate {
    fn name(&self) -> &str {
        names::FIXTURE_BALANCE
    }

    async fn run(&self) -> GateResult {
        tracing::debug!("Auditing fixture balance of {}", self.fixture.display());
        let outcome = match load_fixture(&self.fixture).await {
            Ok(rows) => audit_fixture(&rows, &self.thresholds),
            Err(e) => Err(e),
        };
        conclude(self.name(), outcome, self.enforce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: usize, tier: Tier, archive_safe: bool, tags: &[&str]) -> FixtureRow {
        FixtureRow {
            id: format!("m{id}"),
            gold_tier: tier,
            archive_safe,
            send_allowed: false,
            scenario_tags: tags.iter().map(|t| t.to_string()).collect(),
            reviewer: "qa".to_string(),
            context: None,
        }
    }

    fn thresholds(tags: &[&str]) -> BalanceThresholds {
        BalanceThresholds {
            min_cases: 3,
            min_tier_count: 1,
            min_tag_count: 1,
            required_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn balanced() -> Vec<FixtureRow> {
        vec![
            row(1, Tier::One, false, &["work", "work"]),
            row(2, Tier::Two, false, &["personal"]),
            row(3, Tier::Three, true, &["marketing", "work"]),
        ]
    }

    #[test]
    fn test_balanced_fixture_passes() {
        let report = audit_fixture(&balanced(), &thresholds(&["work", "personal"])).unwrap();
        assert!(report.failures().is_empty());
        assert_eq!(report.tag_count("work"), 2);
        assert_eq!(report.archive_safe_false, 2);
        assert!(report.render().ends_with("Balance checks: PASS\n"));
    }

    #[test]
    fn test_absent_required_tag_reported_with_zero() {
        let report = audit_fixture(&balanced(), &thresholds(&["work", "medical"])).unwrap();
        assert_eq!(report.failures(), &["Missing required tag coverage: medical(0/1)".to_string()]);
    }

    #[test]
    fn test_adding_tagged_row_never_decreases_count() {
        let mut rows = balanced();
        let t = thresholds(&["school"]);
        let before = audit_fixture(&rows, &t).unwrap().tag_count("school");
        rows.push(row(4, Tier::Two, true, &["school", "work"]));
        let after = audit_fixture(&rows, &t).unwrap().tag_count("school");
        assert!(after >= before);
        assert_eq!(after, 1);
    }

    #[test]
    fn test_all_soft_checks_collected() {
        let rows = vec![row(1, Tier::One, true, &["work"])];
        let t = BalanceThresholds {
            min_cases: 2,
            min_tier_count: 1,
            min_tag_count: 2,
            required_tags: vec!["work".to_string(), "finance".to_string()],
        };
        let report = audit_fixture(&rows, &t).unwrap();
        assert_eq!(
            report.failures(),
            &[
                "Case count 1 is below required minimum 2".to_string(),
                "Tier 2 count 0 is below required minimum 1".to_string(),
                "Tier 3 count 0 is below required minimum 1".to_string(),
                "Missing required tag coverage: work(1/2), finance(0/2)".to_string(),
                "Fixture must include both archive_safe=true and archive_safe=false examples".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicate_and_blank_tags_are_hard_errors() {
        let mut rows = balanced();
        rows.push(row(1, Tier::One, false, &["work"]));
        assert!(matches!(
            audit_fixture(&rows, &thresholds(&[])),
            Err(InputError::DuplicateId { .. })
        ));

        let rows = vec![row(1, Tier::One, false, &[" "])];
        let err = audit_fixture(&rows, &thresholds(&[])).unwrap_err();
        assert!(err.to_string().contains("scenario_tags"));
    }

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(parse_tag_list(" work, ,school,"), vec!["work", "school"]);
    }

    #[test]
    fn test_render_lists_required_tags() {
        let report = audit_fixture(&balanced(), &thresholds(&["personal", "finance"])).unwrap();
        let text = report.render();
        assert!(text.starts_with("Fixture balance report\n- Cases: 3\n- Tier counts: T1=1 T2=1 T3=1\n"));
        assert!(text.contains("- tag finance: 0\n"));
        assert!(text.contains("Balance checks: FAIL\n- Missing required tag coverage: finance(0/1)\n"));
    }

    #[tokio::test]
    async fn test_gate_missing_file_is_unevaluable() {
        let dir = tempfile::tempdir().unwrap();
        let result = FixtureBalanceGate::new(dir.path().join("missing.jsonl")).run().await;
        assert_eq!(result.name, "fixture-balance");
        assert!(result.is_unevaluable());
        assert_eq!(result.exit_code, 1);
    }
}
