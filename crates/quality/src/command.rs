//! Gates run as external processes.
//!
//! The process prints a JSON result on stdout, either as the whole output or
//! as its last non-blank line:
//!
//! ```json
//! {"passed": true, "summary": {"checked": 12}, "failures": []}
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use gatekeeper_core::GateResult;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use crate::config::CommandGateSpec;
use crate::gate::Gate;

/// Result object an external gate prints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GateContract {
    /// Whether the process considers its gate passed
    pub passed: bool,

    /// Metrics
    #[serde(default)]
    pub summary: BTreeMap<String, Value>,

    /// Violations
    #[serde(default)]
    pub failures: Vec<String>,
}

/// Extract the contract from captured stdout.
pub fn parse_contract(stdout: &str) -> Result<GateContract, String> {
    let whole = stdout.trim();
    if whole.is_empty() {
        return Err("no result object on stdout".to_string());
    }
    if let Ok(contract) = serde_json::from_str(whole) {
        return Ok(contract);
    }
    let last = whole.lines().rev().map(str::trim).find(|l| !l.is_empty()).unwrap_or(whole);
    serde_json::from_str(last).map_err(|e| format!("invalid result object on stdout: {}", e))
}

/// An external command run as a gate.
pub struct CommandGate {
    spec: CommandGateSpec,
    root: PathBuf,
}

impl CommandGate {
    /// Create the gate; relative working directories resolve against `root`.
    pub fn new(spec: CommandGateSpec, root: impl Into<PathBuf>) -> Self {
        Self { spec, root: root.into() }
    }

    fn working_dir(&self) -> PathBuf {
        match &self.spec.working_dir {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }
}

#[async_trait]
impl Gate for CommandGate {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn run(&self) -> GateResult {
        let command_line = self.spec.command_line();
        tracing::debug!("Running command gate {}: {}", self.spec.name, command_line);

        let mut cmd = Command::new(&self.spec.program);
        cmd.args(&self.spec.args).current_dir(self.working_dir());

        let output = match cmd.output().await {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!("Command gate {} failed to start: {}", self.spec.name, e);
                return GateResult::unevaluable(&self.spec.name, format!("failed to run `{}`: {}", command_line, e));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let mut text = format!("$ {}\n{}", command_line, stdout);
        if !stderr.is_empty() {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        let result = match parse_contract(&stdout) {
            Ok(contract) => {
                let mut failures = contract.failures;
                if !contract.passed && failures.is_empty() {
                    failures.push("Command reported failure without details".to_string());
                }
                if exit_code != 0 {
                    failures.push(format!("Command exited with status {}", exit_code));
                }
                GateResult {
                    name: self.spec.name.clone(),
                    passed: failures.is_empty(),
                    summary: contract.summary,
                    failures,
                    output: text,
                    exit_code,
                    error: None,
                }
            }
            Err(message) => GateResult {
                name: self.spec.name.clone(),
                passed: false,
                summary: BTreeMap::new(),
                failures: vec![format!("Unable to evaluate: {}", message)],
                output: text,
                exit_code: if exit_code == 0 { 1 } else { exit_code },
                error: Some(message),
            },
        };
        tracing::info!("Gate {}: {} (exit {})", result.name, result.status_label(), result.exit_code);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(name: &str, script: &str) -> CommandGate {
        CommandGate::new(CommandGateSpec::new(name, "sh").arg("-c").arg(script), std::env::temp_dir())
    }

    #[test]
    fn test_parse_contract_last_line() {
        let contract = parse_contract("checking...\n{\"passed\": true, \"summary\": {\"n\": 2}}\n").unwrap();
        assert!(contract.passed);
        assert_eq!(contract.summary["n"], Value::from(2));
        assert!(contract.failures.is_empty());

        assert!(parse_contract("").is_err());
        assert!(parse_contract("all good\n").is_err());
    }

    #[tokio::test]
    async fn test_passing_command() {
        let result = shell("lint", r#"echo '{"passed": true, "summary": {"files": 3}}'"#).run().await;
        assert!(result.passed, "{:?}", result);
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.summary["files"], Value::from(3));
        assert!(result.output.starts_with("$ sh -c"));
    }

    #[tokio::test]
    async fn test_reported_failures_and_exit_status() {
        let result = shell(
            "lint",
            r#"echo '{"passed": false, "failures": ["style drift"]}'; echo warn >&2; exit 3"#,
        )
        .run()
        .await;
        assert!(!result.passed);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.failures, vec!["style drift", "Command exited with status 3"]);
        assert!(result.output.ends_with("warn\n"));
    }

    #[tokio::test]
    async fn test_missing_contract_is_unevaluable() {
        let result = shell("lint", "echo done").run().await;
        assert!(result.is_unevaluable());
        assert_eq!(result.exit_code, 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_unevaluable() {
        let gate = CommandGate::new(CommandGateSpec::new("ghost", "gatekeeper-no-such-program"), std::env::temp_dir());
        let result = gate.run().await;
        assert!(result.is_unevaluable());
        assert!(result.failures[0].starts_with("Unable to evaluate: failed to run `gatekeeper-no-such-program`"));
    }
}
