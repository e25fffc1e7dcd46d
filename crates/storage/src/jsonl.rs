//! Line-delimited JSON and single-object JSON inputs.
//!
//! Files are read fully into memory. Blank lines are skipped but still
//! counted, so diagnostics point at the physical line.

use std::collections::HashSet;
use std::path::Path;

use gatekeeper_core::{
    validate_record, Encoding, FieldSpec, FixtureRow, InputError, Location, PredictionRow, Result,
    SignoffAttestation, ValidatedRecord, FIXTURE_FIELDS, PREDICTION_FIELDS, SIGNOFF_FIELDS,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;

/// Read a whole file as UTF-8.
pub async fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).await.map_err(|source| InputError::Io {
        path: path.display().to_string(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| InputError::Encoding { path: path.display().to_string() })
}

/// Split line-delimited JSON into located objects.
pub fn parse_jsonl(text: &str, source: &str) -> Result<Vec<(Location, Map<String, Value>)>> {
    let mut rows = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let location = Location::line(source, index + 1);
        let value: Value = serde_json::from_str(line).map_err(|e| InputError::Json {
            location: location.clone(),
            message: e.to_string(),
        })?;
        match value {
            Value::Object(map) => rows.push((location, map)),
            _ => return Err(InputError::NotAnObject { location }),
        }
    }
    Ok(rows)
}

/// Parse line-delimited records keyed by a unique id.
///
/// Each line is validated against `fields`, built with `build`, and checked
/// for a repeated key.
pub fn parse_keyed<T, B, K>(
    text: &str,
    source: &str,
    kind: &'static str,
    fields: &[FieldSpec],
    build: B,
    key: K,
) -> Result<Vec<T>>
where
    B: Fn(&ValidatedRecord, &Map<String, Value>) -> Result<T>,
    K: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for (location, raw) in parse_jsonl(text, source)? {
        let record = validate_record(&raw, fields, Encoding::Json, &location)?;
        let row = build(&record, &raw)?;
        if !seen.insert(key(&row).to_string()) {
            return Err(InputError::DuplicateId { kind, id: key(&row).to_string(), location });
        }
        rows.push(row);
    }
    tracing::debug!("Parsed {} {} rows from {}", rows.len(), kind, source);
    Ok(rows)
}

/// Parse fixture rows from text.
pub fn parse_fixture(text: &str, source: &str) -> Result<Vec<FixtureRow>> {
    parse_keyed(
        text,
        source,
        "fixture",
        FIXTURE_FIELDS,
        |record, _| FixtureRow::from_record(record),
        |row| row.id.as_str(),
    )
}

/// Parse prediction rows from text.
pub fn parse_predictions(text: &str, source: &str) -> Result<Vec<PredictionRow>> {
    parse_keyed(
        text,
        source,
        "prediction",
        PREDICTION_FIELDS,
        |record, _| PredictionRow::from_record(record),
        |row| row.id.as_str(),
    )
}

/// Load a fixture file.
pub async fn load_fixture(path: &Path) -> Result<Vec<FixtureRow>> {
    let text = read_text(path).await?;
    parse_fixture(&text, &path.display().to_string())
}

/// Load a predictions file.
pub async fn load_predictions(path: &Path) -> Result<Vec<PredictionRow>> {
    let text = read_text(path).await?;
    parse_predictions(&text, &path.display().to_string())
}

/// Parse the single sign-off object.
pub fn parse_signoff(text: &str, source: &str) -> Result<SignoffAttestation> {
    let location = Location::document(source);
    let value: Value = serde_json::from_str(text).map_err(|e| InputError::Json {
        location: location.clone(),
        message: e.to_string(),
    })?;
    let Value::Object(map) = value else {
        return Err(InputError::NotAnObject { location });
    };
    let record = validate_record(&map, SIGNOFF_FIELDS, Encoding::Json, &location)?;
    SignoffAttestation::from_record(&record)
}

/// Load a sign-off file.
pub async fn load_signoff(path: &Path) -> Result<SignoffAttestation> {
    let text = read_text(path).await?;
    parse_signoff(&text, &path.display().to_string())
}

/// Serialize rows as line-delimited JSON with sorted keys.
pub fn to_jsonl<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        // serde_json::Map is ordered by key, so going through Value sorts fields
        let value = serde_json::to_value(row).map_err(|e| InputError::Json {
            location: Location::record("output", index + 1),
            message: e.to_string(),
        })?;
        out.push_str(&value.to_string());
        out.push('\n');
    }
    Ok(out)
}

/// Write rows as line-delimited JSON, creating parent directories.
pub async fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let payload = to_jsonl(rows)?;
    let io_err = |source| InputError::Io { path: path.display().to_string(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    fs::write(path, payload.as_bytes()).await.map_err(io_err)?;
    tracing::debug!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}
