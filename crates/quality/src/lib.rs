//! Release evidence gates.
//!
//! Evaluators for each kind of evidence, the [`Gate`] seam they share, the
//! orchestrator that turns their results into a GO / NO-GO decision, and the
//! report renderer.

#![warn(missing_docs)]

pub mod config;
pub mod gate;
pub mod eval;
pub mod balance;
pub mod canary;
pub mod signoff;
pub mod structural;
pub mod command;
pub mod engine;
pub mod report;

pub use config::{
    BalanceThresholds, CanaryThresholds, CommandGateSpec, ConfigError, EvalThresholds, ReleaseConfig,
    SignoffThresholds,
};
pub use gate::{names, Evaluation, Gate};
pub use eval::{compute_metrics, evaluate_predictions, EvalMetrics, EvalReport, QuantitativeGate};
pub use balance::{audit_fixture, parse_tag_list, BalanceReport, FixtureBalanceGate};
pub use canary::{audit_canary, CanaryGate, CanaryReport};
pub use signoff::{verify_signoff, SignoffGate, SignoffReport};
pub use structural::{inspect_package, StructuralGate, StructuralReport};
pub use command::{CommandGate, GateContract};
pub use engine::{GateOrchestrator, ReleaseInputs, ReleaseOutcome, RunState};
pub use report::{render_report, resolve_report_path, write_report};
