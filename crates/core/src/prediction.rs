//! Classifier predictions for a fixture.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fixture::Tier;
use crate::schema::{Constraint, FieldSpec, FieldType, ValidatedRecord};

/// What the candidate build decided for one fixture row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRow {
    /// Fixture key
    pub id: String,

    /// Predicted tier
    pub predicted_tier: Tier,

    /// Whether the build chose to archive
    pub archive_selected: bool,

    /// Whether the build tried to send
    pub send_attempted: bool,
}

/// Record contract for prediction rows.
pub const PREDICTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("id", FieldType::Str).with(Constraint::NonBlank),
    FieldSpec::required("predicted_tier", FieldType::Int).with(Constraint::IntIn(Tier::VALUES)),
    FieldSpec::required("archive_selected", FieldType::Bool),
    FieldSpec::required("send_attempted", FieldType::Bool),
];

impl PredictionRow {
    /// Build from a record validated against [`PREDICTION_FIELDS`].
    pub fn from_record(record: &ValidatedRecord) -> Result<Self> {
        Ok(Self {
            id: record.str("id")?.to_string(),
            predicted_tier: Tier::from_record(record, "predicted_tier")?,
            archive_selected: record.bool("archive_selected")?,
            send_attempted: record.bool("send_attempted")?,
        })
    }
}
