//! Canary run log (CSV with a header row).

use std::collections::BTreeSet;
use std::path::Path;

use gatekeeper_core::{
    validate_record, CanaryRunRecord, Encoding, InputError, Location, Result, CANARY_FIELDS, CANARY_HEADERS,
};
use serde_json::{Map, Value};

use crate::jsonl::read_text;

/// Parse a canary log. Row numbers count the header as row 1.
pub fn parse_canary_log(text: &str, source: &str) -> Result<Vec<CanaryRunRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| InputError::Csv { location: Location::row(source, 1), message: e.to_string() })?
        .clone();
    let present: BTreeSet<&str> = headers.iter().map(str::trim).collect();
    let mut missing: Vec<String> = CANARY_HEADERS
        .iter()
        .filter(|h| !present.contains(**h))
        .map(|h| h.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(InputError::MissingHeaders { path: source.to_string(), headers: missing });
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let location = Location::row(source, index + 2);
        let cells = result.map_err(|e| InputError::Csv { location: location.clone(), message: e.to_string() })?;

        let mut raw = Map::new();
        for (name, cell) in headers.iter().zip(cells.iter()) {
            raw.insert(name.trim().to_string(), Value::String(cell.to_string()));
        }

        let record = validate_record(&raw, CANARY_FIELDS, Encoding::Text, &location)?;
        rows.push(CanaryRunRecord::from_record(&record)?);
    }

    tracing::debug!("Parsed {} canary runs from {}", rows.len(), source);
    Ok(rows)
}

/// Load a canary log file.
pub async fn load_canary_log(path: &Path) -> Result<Vec<CanaryRunRecord>> {
    let text = read_text(path).await?;
    parse_canary_log(&text, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::WindowQuery;

    const HEADER: &str = "date,run_id,window_query,email_count,high_volume,is_success,unsafe_action,critical_misarchive,mcp_failure,reviewer,notes";

    #[test]
    fn test_parse_valid_log() {
        let text = format!(
            "{HEADER}\n2026-02-13,r1,newer_than:1d,20,False,TRUE,no,0,no, qa ,\n2026-02-13,r2,newer_than:3d,55,yes,true,false,false,false,qa,\"busy, day\"\n"
        );
        let rows = parse_canary_log(&text, "canary.csv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].window_query, WindowQuery::OneDay);
        assert_eq!(rows[0].reviewer, "qa");
        assert!(!rows[0].high_volume);
        assert!(rows[1].high_volume);
        assert_eq!(rows[1].email_count, 55);
        assert_eq!(rows[1].notes, "busy, day");
    }

    #[test]
    fn test_missing_headers_listed() {
        let err = parse_canary_log("date,run_id,window_query\n", "canary.csv").unwrap_err();
        match err {
            InputError::MissingHeaders { headers, .. } => {
                assert_eq!(headers.len(), 8);
                assert_eq!(headers[0], "critical_misarchive");
                assert!(headers.contains(&"notes".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_date_reports_row() {
        let text = format!("{HEADER}\n2026-02-13,r1,newer_than:1d,1,no,yes,no,no,no,qa,\n2026-13-40,r2,newer_than:1d,1,no,yes,no,no,no,qa,\n");
        let err = parse_canary_log(&text, "canary.csv").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("`date`"));
        assert!(text.contains("canary.csv row 3"));
    }

    #[test]
    fn test_unknown_window_rejected() {
        let text = format!("{HEADER}\n2026-02-13,r1,newer_than:7d,1,no,yes,no,no,no,qa,\n");
        let err = parse_canary_log(&text, "canary.csv").unwrap_err();
        assert!(err.to_string().contains("one of newer_than:1d, newer_than:3d"));
    }

    #[test]
    fn test_negative_email_count_rejected() {
        let text = format!("{HEADER}\n2026-02-13,r1,newer_than:1d,-4,no,yes,no,no,no,qa,\n");
        let err = parse_canary_log(&text, "canary.csv").unwrap_err();
        assert!(matches!(err, InputError::Constraint { ref field, .. } if field == "email_count"));
    }

    #[test]
    fn test_bad_boolean_token_rejected() {
        let text = format!("{HEADER}\n2026-02-13,r1,newer_than:1d,4,maybe,yes,no,no,no,qa,\n");
        let err = parse_canary_log(&text, "canary.csv").unwrap_err();
        assert!(matches!(err, InputError::Constraint { ref field, .. } if field == "high_volume"));
    }

    #[test]
    fn test_header_only_log_is_empty() {
        let rows = parse_canary_log(&format!("{HEADER}\n"), "canary.csv").unwrap();
        assert!(rows.is_empty());
    }
}
