//! Gate thresholds and release configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Thresholds for the quantitative evaluation gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalThresholds {
    /// Minimum number of evaluated cases
    pub min_cases: usize,

    /// Minimum recall on gold tier 1
    pub min_tier1_recall: f64,

    /// Minimum precision on predicted tier 3
    pub min_tier3_precision: f64,

    /// Minimum overall accuracy
    pub min_accuracy: f64,

    /// Maximum unsafe actions per case
    pub max_unsafe_action_rate: f64,
}

impl Default for EvalThresholds {
    fn default() -> Self {
        Self {
            min_cases: 500,
            min_tier1_recall: 0.995,
            min_tier3_precision: 0.99,
            min_accuracy: 0.98,
            max_unsafe_action_rate: 0.0,
        }
    }
}

/// Tags every release fixture must cover.
pub const DEFAULT_REQUIRED_TAGS: &[&str] = &[
    "work",
    "personal",
    "school",
    "medical",
    "finance",
    "marketing",
    "thread-reply",
    "ambiguity",
];

/// Thresholds for the fixture balance gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceThresholds {
    /// Minimum fixture size
    pub min_cases: usize,

    /// Minimum rows per gold tier
    pub min_tier_count: usize,

    /// Minimum rows per required tag
    pub min_tag_count: usize,

    /// Scenario tags that must reach `min_tag_count`
    pub required_tags: Vec<String>,
}

impl Default for BalanceThresholds {
    fn default() -> Self {
        Self {
            min_cases: 500,
            min_tier_count: 75,
            min_tag_count: 15,
            required_tags: DEFAULT_REQUIRED_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Thresholds for the canary evidence gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryThresholds {
    /// Distinct calendar days required
    pub required_days: usize,

    /// Minimum runs on each logged day
    pub runs_per_day: usize,
}

impl Default for CanaryThresholds {
    fn default() -> Self {
        Self { required_days: 7, runs_per_day: 2 }
    }
}

/// Thresholds for the human sign-off gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignoffThresholds {
    /// Minimum reviewed transcripts
    pub min_reviews: i64,
}

impl Default for SignoffThresholds {
    fn default() -> Self {
        Self { min_reviews: 3 }
    }
}

/// An external process run as a gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandGateSpec {
    /// Gate name shown in the report
    pub name: String,

    /// Program to execute
    pub program: String,

    /// Program arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory, relative to the package root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl CommandGateSpec {
    /// Create a command gate spec.
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program and arguments as one shell-like line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Thresholds and extra gates for a full release run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Whether gates report a nonzero exit status on soft failures
    pub enforce: bool,

    /// Quantitative evaluation thresholds
    pub eval: EvalThresholds,

    /// Fixture balance thresholds
    pub balance: BalanceThresholds,

    /// Canary thresholds
    pub canary: CanaryThresholds,

    /// Sign-off thresholds
    pub signoff: SignoffThresholds,

    /// Gates run after the built-in ones, in order
    pub command_gates: Vec<CommandGateSpec>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            enforce: true,
            eval: EvalThresholds::default(),
            balance: BalanceThresholds::default(),
            canary: CanaryThresholds::default(),
            signoff: SignoffThresholds::default(),
            command_gates: Vec::new(),
        }
    }
}

/// Failure to load a release config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not a valid config document
    #[error("Invalid config {path}: {message}")]
    Parse {
        /// Config path
        path: String,
        /// Parser message
        message: String,
    },
}

impl ReleaseConfig {
    /// Parse a JSON config. Absent fields keep their defaults.
    pub fn from_json(text: &str, source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Load a JSON config file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text, &path.display().to_string())?;
        tracing::debug!(
            "Loaded release config from {} ({} command gates)",
            path.display(),
            config.command_gates.len()
        );
        Ok(config)
    }
}
