//! Release fixture assembly from a raw message export and reviewer labels.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use gatekeeper_core::{
    Constraint, FieldSpec, FieldType, FixtureRow, InputError, Location, Result, Tier,
};
use serde_json::{Map, Value};

use crate::jsonl::{parse_keyed, read_text, write_jsonl};

/// Raw fields copied into a fixture row's `context`.
pub const RAW_CONTEXT_FIELDS: &[&str] = &["from", "subject", "snippet", "received_at", "thread_id"];

const RAW_FIELDS: &[FieldSpec] = &[FieldSpec::required("id", FieldType::Str).with(Constraint::NonBlank)];

const LABEL_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("id", FieldType::Str).with(Constraint::NonBlank),
    FieldSpec::required("gold_tier", FieldType::Int).with(Constraint::IntIn(Tier::VALUES)),
    FieldSpec::required("archive_safe", FieldType::Bool),
    FieldSpec::required("send_allowed", FieldType::Bool),
    FieldSpec::required("scenario_tags", FieldType::StrList).with(Constraint::NonEmpty),
    FieldSpec::required("reviewer", FieldType::Str).with(Constraint::NonBlank),
];

/// Ids shown in a mismatch diagnostic.
const MISMATCH_SAMPLE: usize = 10;

/// One message from the raw export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Message key
    pub id: String,

    /// Context fields present on the export row
    pub context: Map<String, Value>,
}

/// Parse a raw export.
pub fn parse_raw_messages(text: &str, source: &str) -> Result<Vec<RawMessage>> {
    parse_keyed(
        text,
        source,
        "raw",
        RAW_FIELDS,
        |record, raw| {
            let context = RAW_CONTEXT_FIELDS
                .iter()
                .filter_map(|key| raw.get(*key).map(|v| (key.to_string(), v.clone())))
                .collect();
            Ok(RawMessage { id: record.str("id")?.to_string(), context })
        },
        |row| row.id.as_str(),
    )
}

/// Parse reviewer labels. Labels carry every fixture field except `context`.
pub fn parse_labels(text: &str, source: &str) -> Result<Vec<FixtureRow>> {
    parse_keyed(
        text,
        source,
        "label",
        LABEL_FIELDS,
        |record, _| {
            let mut row = FixtureRow::from_record(record)?;
            row.context = None;
            Ok(row)
        },
        |row| row.id.as_str(),
    )
}

/// Join raw messages with labels, one fixture row per raw message in export
/// order. Every raw id needs exactly one label and vice versa.
pub fn build_fixture(raw: &[RawMessage], labels: Vec<FixtureRow>) -> Result<Vec<FixtureRow>> {
    let mut raw_ids: BTreeSet<&str> = BTreeSet::new();
    for (index, message) in raw.iter().enumerate() {
        if !raw_ids.insert(message.id.as_str()) {
            return Err(InputError::DuplicateId {
                kind: "raw",
                id: message.id.clone(),
                location: Location::record("raw", index + 1),
            });
        }
    }
    let mut by_id: HashMap<String, FixtureRow> = HashMap::with_capacity(labels.len());
    for (index, label) in labels.into_iter().enumerate() {
        if by_id.contains_key(&label.id) {
            return Err(InputError::DuplicateId {
                kind: "label",
                id: label.id,
                location: Location::record("label", index + 1),
            });
        }
        by_id.insert(label.id.clone(), label);
    }

    let missing: Vec<String> = raw_ids
        .iter()
        .filter(|id| !by_id.contains_key(**id as &str))
        .map(|id| id.to_string())
        .collect();
    let mut extra: Vec<String> = by_id
        .keys()
        .filter(|id| !raw_ids.contains(id.as_str()))
        .cloned()
        .collect();
    extra.sort();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(InputError::IdMismatch {
            context: "labels vs raw export".to_string(),
            missing,
            extra,
            sample: MISMATCH_SAMPLE,
        });
    }

    let mut rows = Vec::with_capacity(raw.len());
    for message in raw {
        let Some(mut row) = by_id.remove(&message.id) else {
            continue;
        };
        let tags: BTreeSet<String> = row.scenario_tags.into_iter().collect();
        row.scenario_tags = tags.into_iter().collect();
        row.reviewer = row.reviewer.trim().to_string();
        row.context = if message.context.is_empty() { None } else { Some(message.context.clone()) };
        rows.push(row);
    }
    Ok(rows)
}

/// One-line fixture overview: row count, tier counts, ten most common tags.
pub fn summarize_fixture(rows: &[FixtureRow]) -> String {
    let mut tiers: BTreeMap<Tier, usize> = Tier::ALL.iter().map(|t| (*t, 0)).collect();
    let mut tags: BTreeMap<&str, usize> = BTreeMap::new();
    for row in rows {
        *tiers.entry(row.gold_tier).or_default() += 1;
        for tag in &row.scenario_tags {
            *tags.entry(tag.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = tags.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let top = if ranked.is_empty() {
        "none".to_string()
    } else {
        ranked
            .iter()
            .take(10)
            .map(|(tag, count)| format!("{}:{}", tag, count))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Fixture rows: {} | Tier1:{} Tier2:{} Tier3:{} | Top tags: {}",
        rows.len(),
        tiers[&Tier::One],
        tiers[&Tier::Two],
        tiers[&Tier::Three],
        top
    )
}

/// Read both inputs, build the fixture, write it to `output`.
pub async fn build_fixture_file(raw_path: &Path, labels_path: &Path, output: &Path) -> Result<Vec<FixtureRow>> {
    let raw_text = read_text(raw_path).await?;
    let raw = parse_raw_messages(&raw_text, &raw_path.display().to_string())?;
    let label_text = read_text(labels_path).await?;
    let labels = parse_labels(&label_text, &labels_path.display().to_string())?;

    let rows = build_fixture(&raw, labels)?;
    write_jsonl(output, &rows).await?;
    tracing::info!("Wrote release fixture with {} rows to {}", rows.len(), output.display());
    Ok(rows)
}
