//! Canary run log records.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{InputError, Result};
use crate::schema::{Constraint, FieldSpec, FieldType, ValidatedRecord};

/// Lookback window a canary run was executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WindowQuery {
    /// `newer_than:1d`
    #[serde(rename = "newer_than:1d")]
    OneDay,
    /// `newer_than:3d`
    #[serde(rename = "newer_than:3d")]
    ThreeDays,
}

impl WindowQuery {
    /// Every window that must be exercised each day.
    pub const REQUIRED: [WindowQuery; 2] = [WindowQuery::OneDay, WindowQuery::ThreeDays];

    /// Wire identifiers of [`Self::REQUIRED`].
    pub const IDENTIFIERS: &'static [&'static str] = &["newer_than:1d", "newer_than:3d"];

    /// Wire identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            WindowQuery::OneDay => "newer_than:1d",
            WindowQuery::ThreeDays => "newer_than:3d",
        }
    }

    /// Parse a wire identifier.
    pub fn parse(raw: &str) -> Option<Self> {
        WindowQuery::REQUIRED.into_iter().find(|w| w.as_str() == raw)
    }
}

impl fmt::Display for WindowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed canary run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryRunRecord {
    /// Calendar day of the run
    pub date: NaiveDate,

    /// Run identifier
    pub run_id: String,

    /// Window the run covered
    pub window_query: WindowQuery,

    /// Items processed
    pub email_count: u64,

    /// Run was flagged as high volume
    pub high_volume: bool,

    /// Run finished successfully
    pub is_success: bool,

    /// Run performed an unsafe action
    pub unsafe_action: bool,

    /// Run archived something critical
    pub critical_misarchive: bool,

    /// Tool transport failed during the run
    pub mcp_failure: bool,

    /// Who reviewed the run
    pub reviewer: String,

    /// Free-form notes
    pub notes: String,
}

/// Column names the canary log header must contain.
pub const CANARY_HEADERS: &[&str] = &[
    "date",
    "run_id",
    "window_query",
    "email_count",
    "high_volume",
    "is_success",
    "unsafe_action",
    "critical_misarchive",
    "mcp_failure",
    "reviewer",
    "notes",
];

/// Record contract for canary rows (text encoding).
pub const CANARY_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("date", FieldType::Date),
    FieldSpec::required("run_id", FieldType::Str),
    FieldSpec::required("window_query", FieldType::Str).with(Constraint::OneOf(WindowQuery::IDENTIFIERS)),
    FieldSpec::required("email_count", FieldType::Int).with(Constraint::NonNegative),
    FieldSpec::required("high_volume", FieldType::Bool),
    FieldSpec::required("is_success", FieldType::Bool),
    FieldSpec::required("unsafe_action", FieldType::Bool),
    FieldSpec::required("critical_misarchive", FieldType::Bool),
    FieldSpec::required("mcp_failure", FieldType::Bool),
    FieldSpec::required("reviewer", FieldType::Str),
    FieldSpec::required("notes", FieldType::Str),
];

impl CanaryRunRecord {
    /// Build from a record validated against [`CANARY_FIELDS`].
    pub fn from_record(record: &ValidatedRecord) -> Result<Self> {
        let window = record.str("window_query")?;
        let window_query = WindowQuery::parse(window).ok_or_else(|| InputError::Constraint {
            location: record.location().clone(),
            field: "window_query".to_string(),
            expected: format!("one of {}", WindowQuery::IDENTIFIERS.join(", ")),
            found: format!("{:?}", window),
        })?;
        let email_count = u64::try_from(record.int("email_count")?).map_err(|_| InputError::Constraint {
            location: record.location().clone(),
            field: "email_count".to_string(),
            expected: ">= 0".to_string(),
            found: "a negative count".to_string(),
        })?;

        Ok(Self {
            date: record.date("date")?,
            run_id: record.str("run_id")?.to_string(),
            window_query,
            email_count,
            high_volume: record.bool("high_volume")?,
            is_success: record.bool("is_success")?,
            unsafe_action: record.bool("unsafe_action")?,
            critical_misarchive: record.bool("critical_misarchive")?,
            mcp_failure: record.bool("mcp_failure")?,
            reviewer: record.str("reviewer")?.to_string(),
            notes: record.str("notes")?.to_string(),
        })
    }
}
