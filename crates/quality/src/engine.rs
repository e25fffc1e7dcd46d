//! Gate orchestration.

use std::path::PathBuf;

use gatekeeper_core::{GateResult, ReleaseDecision};

use crate::balance::FixtureBalanceGate;
use crate::canary::CanaryGate;
use crate::command::CommandGate;
use crate::config::ReleaseConfig;
use crate::eval::QuantitativeGate;
use crate::gate::Gate;
use crate::signoff::SignoffGate;
use crate::structural::StructuralGate;

/// Evidence files for a full release run.
#[derive(Debug, Clone)]
pub struct ReleaseInputs {
    /// Labeled fixture
    pub fixture: PathBuf,

    /// Candidate predictions
    pub predictions: PathBuf,

    /// Canary run log
    pub canary_log: PathBuf,

    /// Sign-off attestation
    pub signoff: PathBuf,

    /// Package root for structural checks and command gates
    pub root: PathBuf,
}

/// Where an orchestrator run is.
#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    /// Nothing run yet
    Idle,
    /// Awaiting the gate at `index`
    Running {
        /// Position in gate order
        index: usize,
        /// Gate name
        gate: String,
    },
    /// All gates reported
    Collecting,
    /// Verdict reached
    Decided(ReleaseDecision),
}

/// Results of every gate plus the verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseOutcome {
    /// One result per gate, in gate order
    pub results: Vec<GateResult>,

    /// Logical AND over `results`
    pub decision: ReleaseDecision,
}

/// Runs gates in a fixed order and decides GO / NO-GO.
///
/// Every gate runs even after a failure, so one report shows all blockers.
pub struct GateOrchestrator {
    gates: Vec<Box<dyn Gate>>,
    state: RunState,
}

impl Default for GateOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl GateOrchestrator {
    /// Create an orchestrator with no gates.
    pub fn new() -> Self {
        Self { gates: Vec::new(), state: RunState::Idle }
    }

    /// Append a gate.
    pub fn with_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// The standard release gates followed by configured command gates.
    pub fn from_config(config: &ReleaseConfig, inputs: &ReleaseInputs) -> Self {
        let enforce = config.enforce;
        let mut orchestrator = Self::new()
            .with_gate(StructuralGate::new(&inputs.root))
            .with_gate(
                FixtureBalanceGate::new(&inputs.fixture)
                    .with_thresholds(config.balance.clone())
                    .enforce(enforce),
            )
            .with_gate(
                QuantitativeGate::new(&inputs.fixture, &inputs.predictions)
                    .with_thresholds(config.eval.clone())
                    .enforce(enforce),
            )
            .with_gate(
                CanaryGate::new(&inputs.canary_log)
                    .with_thresholds(config.canary.clone())
                    .enforce(enforce),
            )
            .with_gate(
                SignoffGate::new(&inputs.signoff)
                    .with_thresholds(config.signoff.clone())
                    .enforce(enforce),
            );
        for spec in &config.command_gates {
            orchestrator = orchestrator.with_gate(CommandGate::new(spec.clone(), &inputs.root));
        }
        orchestrator
    }

    /// Gate names in run order.
    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Current state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Run every gate in order and decide.
    pub async fn run(&mut self) -> ReleaseOutcome {
        let mut results = Vec::with_capacity(self.gates.len());
        for (index, gate) in self.gates.iter().enumerate() {
            self.state = RunState::Running { index, gate: gate.name().to_string() };
            tracing::debug!("Starting gate {}/{}: {}", index + 1, self.gates.len(), gate.name());
            results.push(gate.run().await);
        }

        self.state = RunState::Collecting;
        let decision = ReleaseDecision::from_results(&results);
        match &decision {
            ReleaseDecision::Go => tracing::info!("Release decision: GO ({} gates passed)", results.len()),
            ReleaseDecision::NoGo { blockers } => {
                tracing::info!("Release decision: NO-GO (blocked by {})", blockers.join(", "))
            }
        }
        self.state = RunState::Decided(decision.clone());
        ReleaseOutcome { results, decision }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::config::CommandGateSpec;

    struct FixedGate {
        name: &'static str,
        passed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Gate for FixedGate {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self) -> GateResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.passed {
                GateResult::evaluated(self.name, BTreeMap::new(), Vec::new(), "ok\n", true)
            } else {
                GateResult::evaluated(self.name, BTreeMap::new(), vec!["broken".to_string()], "bad\n", true)
            }
        }
    }

    fn fixed(name: &'static str, passed: bool, calls: &Arc<AtomicUsize>) -> FixedGate {
        FixedGate { name, passed, calls: calls.clone() }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_gates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut orchestrator = GateOrchestrator::new()
            .with_gate(fixed("first", false, &calls))
            .with_gate(fixed("second", true, &calls))
            .with_gate(fixed("third", false, &calls));
        assert_eq!(orchestrator.state(), &RunState::Idle);

        let outcome = orchestrator.run().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let order: Vec<&str> = outcome.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
        assert_eq!(outcome.decision.blockers(), &["first".to_string(), "third".to_string()]);
        assert_eq!(orchestrator.state(), &RunState::Decided(outcome.decision.clone()));
    }

    #[tokio::test]
    async fn test_all_passing_is_go() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut orchestrator = GateOrchestrator::new()
            .with_gate(fixed("a", true, &calls))
            .with_gate(fixed("b", true, &calls));
        let outcome = orchestrator.run().await;
        assert!(outcome.decision.is_go());
        assert_eq!(outcome.decision.exit_code(), 0);
    }

    #[test]
    fn test_config_gate_order() {
        let mut config = ReleaseConfig::default();
        config.command_gates.push(CommandGateSpec::new("unit-tests", "cargo").arg("test"));
        let inputs = ReleaseInputs {
            fixture: "fixture.jsonl".into(),
            predictions: "predictions.jsonl".into(),
            canary_log: "canary.csv".into(),
            signoff: "signoff.json".into(),
            root: ".".into(),
        };
        let orchestrator = GateOrchestrator::from_config(&config, &inputs);
        assert_eq!(
            orchestrator.gate_names(),
            vec!["structural", "fixture-balance", "quantitative-eval", "canary", "human-signoff", "unit-tests"]
        );
    }

    #[tokio::test]
    async fn test_missing_inputs_yield_no_go_with_every_gate() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = ReleaseInputs {
            fixture: dir.path().join("fixture.jsonl"),
            predictions: dir.path().join("predictions.jsonl"),
            canary_log: dir.path().join("canary.csv"),
            signoff: dir.path().join("signoff.json"),
            root: dir.path().to_path_buf(),
        };
        let mut orchestrator = GateOrchestrator::from_config(&ReleaseConfig::default(), &inputs);
        let outcome = orchestrator.run().await;
        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.decision.blockers().len(), 5);
        assert!(outcome.results[1..].iter().all(|r| r.is_unevaluable()));
    }
}
