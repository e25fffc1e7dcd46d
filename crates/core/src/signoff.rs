//! Human release attestation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{FieldSpec, FieldType, ValidatedRecord};

/// The single sign-off record for a release candidate.
///
/// Blank `approved_by` / `approved_at` values are accepted here and reported
/// by the verifier as soft failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignoffAttestation {
    /// Number of transcripts reviewed by a human
    #[serde(rename = "eric_transcript_reviews")]
    pub transcript_review_count: i64,

    /// Voice/tone of generated replies approved
    pub voice_quality_approved: bool,

    /// Archive explanations approved
    pub archive_clarity_approved: bool,

    /// Approver
    pub approved_by: String,

    /// Approval timestamp, free-form
    pub approved_at: String,
}

/// Record contract for the sign-off document.
pub const SIGNOFF_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("eric_transcript_reviews", FieldType::Int),
    FieldSpec::required("voice_quality_approved", FieldType::Bool),
    FieldSpec::required("archive_clarity_approved", FieldType::Bool),
    FieldSpec::required("approved_by", FieldType::Str),
    FieldSpec::required("approved_at", FieldType::Str),
];

impl SignoffAttestation {
    /// Build from a record validated against [`SIGNOFF_FIELDS`].
    pub fn from_record(record: &ValidatedRecord) -> Result<Self> {
        Ok(Self {
            transcript_review_count: record.int("eric_transcript_reviews")?,
            voice_quality_approved: record.bool("voice_quality_approved")?,
            archive_clarity_approved: record.bool("archive_clarity_approved")?,
            approved_by: record.str("approved_by")?.to_string(),
            approved_at: record.str("approved_at")?.to_string(),
        })
    }
}
