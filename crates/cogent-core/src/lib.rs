//! Cognitive processes and the iteration loop of the Cogent engine.
//!
//! Agents from `cogent-agents` learn and decide here: each iteration runs
//! anticipatory learning, counterfactual thinking, innovation, social
//! learning, two-phase action selection and action taking, then maintains
//! the rule bases.
//!
//! # Modules
//!
//! - [`config`] -- Engine configuration loaded from YAML
//! - [`domain`] -- The [`Domain`] trait a host implements: contexts,
//!   initial states, and iteration hooks
//! - [`history`] -- Bounded snapshots of completed iterations
//! - [`processes`] -- The cognitive processes
//! - [`maintenance`] -- Rule aging and pruning
//! - [`random`] -- Power-law and weighted draws
//! - [`simulation`] -- [`Simulation`], the iteration loop
//! - [`error`] -- [`EngineError`] and [`ConfigError`]

pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod maintenance;
pub mod processes;
pub mod random;
pub mod simulation;

pub use config::{EngineConfig, InnovationConfig, LoggingConfig, ProcessConfig, RunConfig};
pub use domain::{DecisionContext, Domain, default_initial_state};
pub use error::{ConfigError, EngineError};
pub use history::{History, IterationSnapshot};
pub use simulation::{IterationReport, RunSummary, Simulation, StopReason};
