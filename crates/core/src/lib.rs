//! Gatekeeper core data models.
//!
//! Record types for every gate input, the shared schema validator, the
//! hard-error type, and gate outcomes.

#![warn(missing_docs)]

mod error;
pub mod schema;

mod fixture;
mod prediction;
mod canary;
mod signoff;
mod gate;

pub use error::{InputError, Location, Position, Result};
pub use schema::{validate_record, Constraint, Encoding, FieldSpec, FieldType, ValidatedRecord};

pub use fixture::{FixtureRow, Tier, FIXTURE_FIELDS};
pub use prediction::{PredictionRow, PREDICTION_FIELDS};
pub use canary::{CanaryRunRecord, WindowQuery, CANARY_FIELDS, CANARY_HEADERS};
pub use signoff::{SignoffAttestation, SIGNOFF_FIELDS};
pub use gate::{GateResult, ReleaseDecision};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
