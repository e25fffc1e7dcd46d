//! Markdown release report.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use gatekeeper_core::{InputError, Time};

use crate::engine::ReleaseOutcome;

/// Default report location under a package root.
pub fn default_report_path(root: &Path, date: NaiveDate) -> PathBuf {
    root.join("docs")
        .join("release")
        .join("reports")
        .join(format!("{}-release-report.md", date.format("%Y-%m-%d")))
}

/// Resolve an explicit output path; relative paths are taken from `root`.
pub fn resolve_report_path(root: &Path, output: Option<&Path>, today: NaiveDate) -> PathBuf {
    match output {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => root.join(path),
        None => default_report_path(root, today),
    }
}

/// Render the report. Output depends only on the outcome and `generated_at`.
pub fn render_report(outcome: &ReleaseOutcome, generated_at: Time) -> String {
    let mut lines = vec![
        "# Release Gate Report".to_string(),
        String::new(),
        format!("- Generated at: `{}`", generated_at.format("%Y-%m-%dT%H:%M:%SZ")),
        format!("- Final decision: **{}**", outcome.decision),
        String::new(),
        "## Gate Summary".to_string(),
    ];
    for result in &outcome.results {
        lines.push(format!(
            "- {}: `{}` (exit `{}`)",
            result.status_label(),
            result.name,
            result.exit_code
        ));
    }

    lines.push(String::new());
    lines.push("## Gate Details".to_string());
    for result in &outcome.results {
        lines.push(format!("### {} - {}", result.name, result.status_label()));
        lines.push("```text".to_string());
        let output = result.output.trim();
        lines.push(if output.is_empty() { "(no output)".to_string() } else { output.to_string() });
        lines.push("```".to_string());
        lines.push(String::new());
    }

    if !outcome.decision.is_go() {
        lines.push("## Blockers".to_string());
        for blocker in outcome.decision.blockers() {
            lines.push(format!("- `{}` failed. Review output above.", blocker));
        }
        lines.push(String::new());
    }

    let mut text = lines.join("\n").trim_end().to_string();
    text.push('\n');
    text
}

/// Write the report, creating parent directories.
pub async fn write_report(path: &Path, text: &str) -> Result<(), InputError> {
    let io_err = |source| InputError::Io { path: path.display().to_string(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, text).await.map_err(io_err)?;
    tracing::info!("Wrote release report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gatekeeper_core::{GateResult, ReleaseDecision};
    use std::collections::BTreeMap;

    fn at() -> Time {
        chrono::Utc.with_ymd_and_hms(2026, 2, 20, 9, 30, 0).unwrap()
    }

    fn outcome(results: Vec<GateResult>) -> ReleaseOutcome {
        let decision = ReleaseDecision::from_results(&results);
        ReleaseOutcome { results, decision }
    }

    #[test]
    fn test_no_go_report() {
        let pass = GateResult::evaluated("structural", BTreeMap::new(), Vec::new(), "Release validation passed.\n", true);
        let fail = GateResult::evaluated("canary", BTreeMap::new(), vec!["Canary log is empty".to_string()], "", true);
        let text = render_report(&outcome(vec![pass, fail]), at());

        assert_eq!(
            text,
            "# Release Gate Report\n\
             \n\
             - Generated at: `2026-02-20T09:30:00Z`\n\
             - Final decision: **NO-GO**\n\
             \n\
             ## Gate Summary\n\
             - PASS: `structural` (exit `0`)\n\
             - FAIL: `canary` (exit `1`)\n\
             \n\
             ## Gate Details\n\
             ### structural - PASS\n\
             ```text\n\
             Release validation passed.\n\
             ```\n\
             \n\
             ### canary - FAIL\n\
             ```text\n\
             (no output)\n\
             ```\n\
             \n\
             ## Blockers\n\
             - `canary` failed. Review output above.\n"
        );
    }

    #[test]
    fn test_go_report_has_no_blockers() {
        let pass = GateResult::evaluated("structural", BTreeMap::new(), Vec::new(), "ok", true);
        let text = render_report(&outcome(vec![pass]), at());
        assert!(text.contains("**GO**"));
        assert!(!text.contains("## Blockers"));
        assert!(text.ends_with("```\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let fail = GateResult::unevaluable("human-signoff", "Missing required field(s) approved_at at signoff.json");
        let o = outcome(vec![fail]);
        assert_eq!(render_report(&o, at()), render_report(&o, at()));
    }

    #[test]
    fn test_report_paths() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let root = Path::new("/pkg");
        assert_eq!(
            resolve_report_path(root, None, day),
            PathBuf::from("/pkg/docs/release/reports/2026-02-20-release-report.md")
        );
        assert_eq!(resolve_report_path(root, Some(Path::new("out.md")), day), PathBuf::from("/pkg/out.md"));
        assert_eq!(resolve_report_path(root, Some(Path::new("/tmp/r.md")), day), PathBuf::from("/tmp/r.md"));
    }

    #[tokio::test]
    async fn test_write_report_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs/release/reports/r.md");
        write_report(&path, "# Release Gate Report\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# Release Gate Report\n");
    }
}
