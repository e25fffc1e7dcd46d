//! Gatekeeper CLI - release evidence gates.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatekeeper_core::GateResult;
use gatekeeper_quality::{
    parse_tag_list, render_report, resolve_report_path, write_report, BalanceThresholds, CanaryGate,
    CanaryThresholds, EvalThresholds, FixtureBalanceGate, Gate, GateOrchestrator, QuantitativeGate,
    ReleaseConfig, ReleaseInputs, SignoffGate, SignoffThresholds, StructuralGate,
};
use gatekeeper_storage::{build_fixture_file, summarize_fixture};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gatekeeper")]
#[command(about = "Release GO / NO-GO evidence gates", long_about = None)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate predictions against the labeled fixture
    Eval {
        /// Fixture JSONL
        #[arg(long)]
        fixture: PathBuf,
        /// Predictions JSONL
        #[arg(long)]
        predictions: PathBuf,
        /// Minimum number of evaluated cases
        #[arg(long, default_value_t = 500)]
        min_cases: usize,
        /// Minimum recall on gold tier 1
        #[arg(long, default_value_t = 0.995)]
        min_tier1_recall: f64,
        /// Minimum precision on predicted tier 3
        #[arg(long, default_value_t = 0.99)]
        min_tier3_precision: f64,
        /// Minimum overall tier accuracy
        #[arg(long, default_value_t = 0.98)]
        min_accuracy: f64,
        /// Maximum share of cases with an unsafe archive or send
        #[arg(long, default_value_t = 0.0)]
        max_unsafe_action_rate: f64,
        /// Exit 1 when thresholds are not met
        #[arg(long)]
        enforce: bool,
    },
    /// Audit fixture coverage
    Balance {
        /// Fixture JSONL
        #[arg(long)]
        fixture: PathBuf,
        /// Minimum number of fixture rows
        #[arg(long, default_value_t = 500)]
        min_cases: usize,
        /// Minimum rows per required scenario tag
        #[arg(long, default_value_t = 15)]
        min_tag_count: usize,
        /// Minimum rows per gold tier
        #[arg(long, default_value_t = 75)]
        min_tier_count: usize,
        /// Comma-separated required scenario tags
        #[arg(long)]
        required_tags: Option<String>,
        /// Exit 1 when balance checks fail
        #[arg(long)]
        enforce: bool,
    },
    /// Audit the canary run log
    Canary {
        /// Canary CSV log
        #[arg(long)]
        log: PathBuf,
        /// Distinct calendar days the log must cover
        #[arg(long, default_value_t = 7)]
        required_days: usize,
        /// Minimum runs on each logged day
        #[arg(long, default_value_t = 2)]
        runs_per_day: usize,
        /// Exit 1 when canary checks fail
        #[arg(long)]
        enforce: bool,
    },
    /// Verify the human sign-off
    Signoff {
        /// Sign-off JSON
        #[arg(long)]
        signoff: PathBuf,
        /// Minimum number of completed reviews
        #[arg(long, default_value_t = 3)]
        min_reviews: i64,
        /// Exit 1 when sign-off checks fail
        #[arg(long)]
        enforce: bool,
    },
    /// Check package manifest, frontmatter and placeholders
    Structural {
        /// Package root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Build the release fixture from a raw export and reviewer labels
    BuildFixture {
        /// Raw export JSONL
        #[arg(long)]
        raw: PathBuf,
        /// Reviewer labels JSONL
        #[arg(long)]
        labels: PathBuf,
        /// Fixture JSONL to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Run every gate and write the release report
    Report {
        /// Fixture JSONL
        #[arg(long)]
        fixture: PathBuf,
        /// Predictions JSONL
        #[arg(long)]
        predictions: PathBuf,
        /// Canary CSV log
        #[arg(long)]
        canary_log: PathBuf,
        /// Sign-off JSON
        #[arg(long)]
        signoff: PathBuf,
        /// Package root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Report path; defaults to docs/release/reports/<date>-release-report.md
        #[arg(long)]
        output: Option<PathBuf>,
        /// Release config JSON
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Eval {
            fixture,
            predictions,
            min_cases,
            min_tier1_recall,
            min_tier3_precision,
            min_accuracy,
            max_unsafe_action_rate,
            enforce,
        } => {
            let thresholds = EvalThresholds {
                min_cases,
                min_tier1_recall,
                min_tier3_precision,
                min_accuracy,
                max_unsafe_action_rate,
            };
            let gate = QuantitativeGate::new(fixture, predictions)
                .with_thresholds(thresholds)
                .enforce(enforce);
            Ok(finish(gate.run().await))
        }
        Commands::Balance {
            fixture,
            min_cases,
            min_tag_count,
            min_tier_count,
            required_tags,
            enforce,
        } => {
            let mut thresholds = BalanceThresholds { min_cases, min_tag_count, min_tier_count, ..Default::default() };
            if let Some(tags) = required_tags {
                thresholds.required_tags = parse_tag_list(&tags);
            }
            let gate = FixtureBalanceGate::new(fixture).with_thresholds(thresholds).enforce(enforce);
            Ok(finish(gate.run().await))
        }
        Commands::Canary { log, required_days, runs_per_day, enforce } => {
            let gate = CanaryGate::new(log)
                .with_thresholds(CanaryThresholds { required_days, runs_per_day })
                .enforce(enforce);
            Ok(finish(gate.run().await))
        }
        Commands::Signoff { signoff, min_reviews, enforce } => {
            let gate = SignoffGate::new(signoff)
                .with_thresholds(SignoffThresholds { min_reviews })
                .enforce(enforce);
            Ok(finish(gate.run().await))
        }
        Commands::Structural { root } => Ok(finish(StructuralGate::new(root).run().await)),
        Commands::BuildFixture { raw, labels, output } => {
            let rows = build_fixture_file(&raw, &labels, &output)
                .await
                .with_context(|| format!("Failed to build fixture from {}", raw.display()))?;
            println!("{}", summarize_fixture(&rows));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { fixture, predictions, canary_log, signoff, root, output, config } => {
            let config = match config {
                Some(path) => ReleaseConfig::load(&path).await?,
                None => ReleaseConfig::default(),
            };
            let inputs = ReleaseInputs { fixture, predictions, canary_log, signoff, root };

            let mut orchestrator = GateOrchestrator::from_config(&config, &inputs);
            let outcome = orchestrator.run().await;

            let generated_at = chrono::Utc::now();
            let path = resolve_report_path(&inputs.root, output.as_deref(), generated_at.date_naive());
            write_report(&path, &render_report(&outcome, generated_at)).await?;

            println!("Wrote report to {}", path.display());
            println!("Release decision: {}", outcome.decision);
            Ok(ExitCode::from(outcome.decision.exit_code()))
        }
    }
}

/// Print a gate's diagnostic text and map its exit status.
fn finish(result: GateResult) -> ExitCode {
    print!("{}", result.output);
    if !result.output.ends_with('\n') {
        println!();
    }
    info!("{} finished with exit status {}", result.name, result.exit_code);
    ExitCode::from(exit_status(&result))
}

/// Process exit status for a gate result. Anything outside `0..=255` is 1.
fn exit_status(result: &GateResult) -> u8 {
    u8::try_from(result.exit_code).unwrap_or(1)
}
