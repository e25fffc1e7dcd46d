//! Gold-labeled fixture rows.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InputError, Result};
use crate::schema::{Constraint, FieldSpec, FieldType, ValidatedRecord};

/// Priority tier; 1 is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    /// Highest priority
    One = 1,
    /// Normal priority
    Two = 2,
    /// Low priority, archive candidate
    Three = 3,
}

impl Tier {
    /// All tiers in ascending order.
    pub const ALL: [Tier; 3] = [Tier::One, Tier::Two, Tier::Three];

    /// Allowed raw values, for schema contracts.
    pub const VALUES: &'static [i64] = &[1, 2, 3];

    /// Numeric value.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Convert from a raw integer.
    pub fn from_i64(raw: i64) -> Option<Self> {
        match raw {
            1 => Some(Tier::One),
            2 => Some(Tier::Two),
            3 => Some(Tier::Three),
            _ => None,
        }
    }

    pub(crate) fn from_record(record: &ValidatedRecord, field: &str) -> Result<Self> {
        let raw = record.int(field)?;
        Tier::from_i64(raw).ok_or_else(|| InputError::Constraint {
            location: record.location().clone(),
            field: field.to_string(),
            expected: "one of 1, 2, 3".to_string(),
            found: raw.to_string(),
        })
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(raw: u8) -> std::result::Result<Self, Self::Error> {
        Tier::from_i64(i64::from(raw)).ok_or_else(|| format!("invalid tier {}", raw))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier.value()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// One labeled case of the release fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureRow {
    /// Unique key
    pub id: String,

    /// Reviewer-assigned tier
    pub gold_tier: Tier,

    /// Whether archiving this item is acceptable
    pub archive_safe: bool,

    /// Whether sending on this item is acceptable
    pub send_allowed: bool,

    /// Scenario categories
    pub scenario_tags: Vec<String>,

    /// Who labeled the row
    pub reviewer: String,

    /// Raw message context copied from the export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

/// Record contract for fixture rows.
pub const FIXTURE_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("id", FieldType::Str).with(Constraint::NonBlank),
    FieldSpec::required("gold_tier", FieldType::Int).with(Constraint::IntIn(Tier::VALUES)),
    FieldSpec::required("archive_safe", FieldType::Bool),
    FieldSpec::required("send_allowed", FieldType::Bool),
    FieldSpec::required("scenario_tags", FieldType::StrList).with(Constraint::NonEmpty),
    FieldSpec::required("reviewer", FieldType::Str).with(Constraint::NonBlank),
    FieldSpec::optional("context", FieldType::Object),
];

impl FixtureRow {
    /// Build from a record validated against [`FIXTURE_FIELDS`].
    pub fn from_record(record: &ValidatedRecord) -> Result<Self> {
        Ok(Self {
            id: record.str("id")?.to_string(),
            gold_tier: Tier::from_record(record, "gold_tier")?,
            archive_safe: record.bool("archive_safe")?,
            send_allowed: record.bool("send_allowed")?,
            scenario_tags: record.str_list("scenario_tags")?.to_vec(),
            reviewer: record.str("reviewer")?.to_string(),
            context: record.object_opt("context").cloned(),
        })
    }

    /// Tags with duplicates removed, sorted.
    pub fn distinct_tags(&self) -> BTreeSet<&str> {
        self.scenario_tags.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::schema::{validate_record, Encoding};
    use serde_json::json;

    #[test]
    fn test_fixture_row_from_record() {
        let raw = json!({
            "id": "msg-1",
            "gold_tier": 1,
            "archive_safe": false,
            "send_allowed": true,
            "scenario_tags": ["work", "ambiguity", "work"],
            "reviewer": "qa",
            "context": {"subject": "hello"}
        });
        let loc = Location::line("fixture.jsonl", 1);
        let record = validate_record(raw.as_object().unwrap(), FIXTURE_FIELDS, Encoding::Json, &loc).unwrap();
        let row = FixtureRow::from_record(&record).unwrap();

        assert_eq!(row.gold_tier, Tier::One);
        assert_eq!(row.distinct_tags().into_iter().collect::<Vec<_>>(), vec!["ambiguity", "work"]);
        assert_eq!(row.context.unwrap()["subject"], "hello");
    }

    #[test]
    fn test_tier_serde_as_integer() {
        assert_eq!(serde_json::to_string(&Tier::Three).unwrap(), "3");
        let tier: Tier = serde_json::from_str("2").unwrap();
        assert_eq!(tier, Tier::Two);
        assert!(serde_json::from_str::<Tier>("4").is_err());
    }

    #[test]
    fn test_context_skipped_when_absent() {
        let row = FixtureRow {
            id: "a".to_string(),
            gold_tier: Tier::Two,
            archive_safe: true,
            send_allowed: false,
            scenario_tags: vec!["work".to_string()],
            reviewer: "qa".to_string(),
            context: None,
        };
        let text = serde_json::to_string(&row).unwrap();
        assert!(!text.contains("context"));
    }
}
