//! Error types for the cogent-core crate.
//!
//! Every [`EngineError`] aborts the run: a single agent's failure ends the
//! iteration and the simulation. Ending because no agent is active is not
//! an error and is reported through the run summary instead.

use cogent_agents::AgentError;
use cogent_types::{AgentId, LayerKey, Tendency};

/// Errors that can occur while running the cognitive processes.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A rule base or agent lookup failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The population has no archetypes at start.
    #[error("no agent archetypes are configured")]
    EmptyArchetypes,

    /// Action selection found neither a qualifying rule nor a do-nothing
    /// fallback for a layer.
    #[error("agent {agent}: no rule selected in layer {layer}")]
    NoRuleSelected {
        /// The selecting agent.
        agent: AgentId,
        /// The layer that produced no choice.
        layer: LayerKey,
    },

    /// A process reached a tendency it does not define behaviour for.
    #[error("{process} does not support goal tendency {tendency}")]
    UnsupportedTendency {
        /// Name of the cognitive process.
        process: &'static str,
        /// The tendency of the goal being processed.
        tendency: Tendency,
    },

    /// An agent has no state for the iteration being processed.
    #[error("agent {agent} has no state for iteration {iteration}")]
    MissingState {
        /// The agent whose state is missing.
        agent: AgentId,
        /// The iteration looked up.
        iteration: u64,
    },

    /// A domain hook reported a failure.
    #[error("domain hook {hook} failed: {reason}")]
    Hook {
        /// Name of the hook.
        hook: &'static str,
        /// Description supplied by the domain.
        reason: String,
    },

    /// Engine configuration failed validation.
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds unusable values.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of the problem.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfig {
            reason: err.to_string(),
        }
    }
}
