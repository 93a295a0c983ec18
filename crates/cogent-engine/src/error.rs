//! Error types for the host binary.

/// Top-level error for scenario loading and the run.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Engine configuration could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cogent_core::ConfigError,
    },

    /// The scenario section is missing pieces or malformed.
    #[error("scenario error: {message}")]
    Scenario {
        /// Description of the problem.
        message: String,
    },

    /// Building archetypes or agents failed.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: cogent_agents::AgentError,
    },

    /// The simulation aborted.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: cogent_core::EngineError,
    },
}
