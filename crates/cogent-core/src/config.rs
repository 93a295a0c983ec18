//! Configuration loading and typed config structures for the Cogent engine.
//!
//! The engine configuration is a small YAML document. Every section and
//! field is optional and falls back to the defaults documented on each
//! struct, so an empty document is a valid configuration.
//!
//! ```yaml
//! run:
//!   iterations: 20
//!   seed: 7
//! processes:
//!   social_learning: false
//! innovation:
//!   power_law_exponent: 2.5
//! logging:
//!   level: debug
//! ```

use std::path::Path;

use serde::Deserialize;

pub use crate::error::ConfigError;

/// Environment variable that overrides `run.seed`.
pub const SEED_ENV: &str = "COGENT_SEED";

/// Smallest history depth that still satisfies the learning cursor
/// (current, previous, and twice-previous snapshots).
pub const MIN_HISTORY_DEPTH: usize = 3;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Iteration count, seed, and history retention.
    #[serde(default)]
    pub run: RunConfig,

    /// Which cognitive processes run each iteration.
    #[serde(default)]
    pub processes: ProcessConfig,

    /// Innovation parameters.
    #[serde(default)]
    pub innovation: InnovationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `COGENT_SEED`, when set to an integer, overrides `run.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.run.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.iterations == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("run.iterations must be at least 1"),
            });
        }
        let exponent = self.innovation.power_law_exponent;
        if !exponent.is_finite() || exponent <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!("innovation.power_law_exponent must be positive, got {exponent}"),
            });
        }
        Ok(())
    }
}

/// Run-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Number of iterations to run.
    #[serde(default = "default_iterations")]
    pub iterations: u64,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Iteration snapshots retained. 0 keeps every snapshot; smaller
    /// non-zero values are raised to [`MIN_HISTORY_DEPTH`].
    #[serde(default)]
    pub history_depth: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            seed: default_seed(),
            history_depth: 0,
        }
    }
}

impl RunConfig {
    /// Apply `COGENT_SEED` if it is set and parses.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = std::env::var(SEED_ENV).ok().and_then(|v| v.trim().parse().ok()) {
            self.seed = seed;
        }
    }

    /// History depth with the minimum applied; `None` means unbounded.
    pub fn effective_history_depth(&self) -> Option<usize> {
        match self.history_depth {
            0 => None,
            depth => Some(depth.max(MIN_HISTORY_DEPTH)),
        }
    }
}

/// Process toggles. Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProcessConfig {
    /// Run anticipatory learning from the second iteration on.
    #[serde(default = "default_true")]
    pub anticipatory_learning: bool,

    /// Run counterfactual thinking for goals lacking confidence.
    #[serde(default = "default_true")]
    pub counterfactual_thinking: bool,

    /// Run innovation when counterfactual thinking fails.
    #[serde(default = "default_true")]
    pub innovation: bool,

    /// Copy rules activated by connected agents.
    #[serde(default = "default_true")]
    pub social_learning: bool,

    /// Run phase I of action selection.
    #[serde(default = "default_true")]
    pub action_selection_part_i: bool,

    /// Run phase II (collective quorum) of action selection.
    #[serde(default = "default_true")]
    pub action_selection_part_ii: bool,

    /// Apply activated rules.
    #[serde(default = "default_true")]
    pub action_taking: bool,

    /// Shuffle agents within their archetype group each iteration.
    #[serde(default = "default_true")]
    pub agent_randomization: bool,

    /// Stop early when every activated rule is a do-nothing rule.
    #[serde(default)]
    pub algorithm_stop: bool,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            anticipatory_learning: true,
            counterfactual_thinking: true,
            innovation: true,
            social_learning: true,
            action_selection_part_i: true,
            action_selection_part_ii: true,
            action_taking: true,
            agent_randomization: true,
            algorithm_stop: false,
        }
    }
}

/// Innovation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct InnovationConfig {
    /// Exponent of the power-law draw for new consequent values. Larger
    /// values keep new rules closer to their source.
    #[serde(default = "default_power_law_exponent")]
    pub power_law_exponent: f64,
}

impl Default for InnovationConfig {
    fn default() -> Self {
        Self {
            power_law_exponent: default_power_law_exponent(),
        }
    }
}

/// Logging configuration, consumed by the host binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (required by serde)
// ---------------------------------------------------------------------------

const fn default_iterations() -> u64 {
    10
}

const fn default_seed() -> u64 {
    42
}

const fn default_true() -> bool {
    true
}

const fn default_power_law_exponent() -> f64 {
    2.0
}

fn default_log_level() -> String {
    String::from("info")
}
