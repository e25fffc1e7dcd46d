//! Evidence input loading for Gatekeeper.
//!
//! Readers for the fixture, prediction, canary and sign-off files, the
//! fixture writer, and the fixture builder that joins a raw export with
//! reviewer labels.

#![warn(missing_docs)]

pub mod jsonl;
pub mod canary_log;
pub mod builder;

pub use jsonl::{
    load_fixture, load_predictions, load_signoff, parse_fixture, parse_predictions, parse_signoff, read_text,
    to_jsonl, write_jsonl,
};
pub use canary_log::{load_canary_log, parse_canary_log};
pub use builder::{build_fixture, build_fixture_file, summarize_fixture, RawMessage};
