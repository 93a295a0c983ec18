//! Rule model, agents, and per-iteration state for the Cogent engine.
//!
//! This crate owns everything the cognitive processes read and mutate:
//! named variable stores, the rule base an archetype is built from, the
//! agents instantiated from archetypes, and the snapshots agents carry from
//! one iteration to the next.
//!
//! # Modules
//!
//! - [`variables`] -- Typed variable stores and the private-over-shared overlay
//! - [`goal`] -- Goal definitions
//! - [`rule`] -- Antecedents, consequents, and structurally-compared rules
//! - [`layer`] -- Capacity-bounded rule layers and their do-nothing rule
//! - [`archetype`] -- Archetype definitions and the rule base built from them
//! - [`agent`] -- Agents: assigned rules, influence matrix, freshness
//! - [`state`] -- [`GoalState`], [`RuleHistory`], and [`AgentState`] snapshots
//! - [`population`] -- Archetypes and agents together, rule insertion and eviction
//! - [`error`] -- [`AgentError`]

pub mod agent;
pub mod archetype;
pub mod error;
pub mod goal;
pub mod layer;
pub mod population;
pub mod rule;
pub mod state;
pub mod variables;

#[cfg(test)]
mod fixtures;

pub use agent::Agent;
pub use archetype::{Archetype, ArchetypeDefinition, RuleSet, RuleSetDefinition};
pub use error::AgentError;
pub use goal::Goal;
pub use layer::{DO_NOTHING_NUMBER, RuleLayer, RuleLayerConfig};
pub use population::{Population, RuleInsertion};
pub use rule::{AntecedentPart, AppliedConsequent, Consequent, Rule, RuleDefinition};
pub use state::{AgentState, GoalState, OverwrittenVariable, RuleHistory, TakenAction};
pub use variables::{HOUSEHOLD_VARIABLE, PREVIOUS_PREFIX, StoredValue, Variables};
