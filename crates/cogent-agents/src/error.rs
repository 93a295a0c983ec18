//! Error types for the cogent-agents crate.
//!
//! All operations that can fail return typed errors rather than panicking.
//! Every variant here is fatal to a run: the orchestrator propagates it to
//! the caller without retrying.

use cogent_types::{AgentId, ComparisonOperator, LayerKey, RuleId, ValueKind};

/// Errors that can occur while reading or mutating the rule base and agents.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A variable is present in neither the agent's private store nor the
    /// archetype's shared store.
    #[error("unknown variable: {name}")]
    UnknownVariable {
        /// The variable that was looked up.
        name: String,
    },

    /// An antecedent compared two values of incompatible kinds.
    #[error("cannot evaluate `{variable} {operator} ..`: {left} is not comparable with {right}")]
    TypeMismatch {
        /// The antecedent variable.
        variable: String,
        /// The operator being evaluated.
        operator: ComparisonOperator,
        /// Kind of the live variable value.
        left: ValueKind,
        /// Kind of the constant (or referenced) value.
        right: ValueKind,
    },

    /// A numeric value was required but the variable holds another kind.
    #[error("variable {name} is {found}, expected a number")]
    NotNumeric {
        /// The variable that was read.
        name: String,
        /// The kind actually stored.
        found: ValueKind,
    },

    /// A rule id does not resolve in the archetype's rule base.
    #[error("rule not found: {0}")]
    UnknownRule(RuleId),

    /// A layer key does not resolve in the archetype's rule base.
    #[error("rule layer not found: {0}")]
    UnknownLayer(LayerKey),

    /// A goal name does not resolve in the archetype.
    #[error("goal not found: {0}")]
    UnknownGoal(String),

    /// An agent id does not resolve in the population.
    #[error("agent not found: {0}")]
    UnknownAgent(AgentId),

    /// An archetype name does not resolve in the population.
    #[error("archetype not found: {0}")]
    UnknownArchetype(String),

    /// An agent with the same id is already registered.
    #[error("duplicate agent id: {0}")]
    DuplicateAgent(AgentId),

    /// A layer has neither a static bound nor a bound reference configured.
    #[error("layer {layer} has no {bound} consequent bound")]
    MissingLayerBound {
        /// The layer being queried.
        layer: LayerKey,
        /// Which bound was missing (`"min"` or `"max"`).
        bound: &'static str,
    },

    /// An archetype definition is structurally invalid.
    #[error("invalid archetype definition: {reason}")]
    InvalidDefinition {
        /// Description of what is wrong.
        reason: String,
    },
}
