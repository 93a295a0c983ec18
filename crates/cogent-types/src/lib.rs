//! Shared type definitions for the Cogent cognitive decision engine.
//!
//! This crate is the leaf vocabulary used across the workspace: identifiers,
//! typed variable values, and the small closed enumerations that drive the
//! cognitive processes' dispatch.
//!
//! # Modules
//!
//! - [`ids`] -- [`AgentId`], position-derived [`RuleId`], [`LayerKey`] and
//!   the archetype-qualified [`ArchetypeRule`]
//! - [`value`] -- Typed variable [`Value`] and comparison semantics
//! - [`enums`] -- [`Tendency`], [`AnticipatedDirection`], operators, signs,
//!   and the [`ContextKey`] of a rule history

pub mod enums;
pub mod ids;
pub mod value;

// Re-export all public types at crate root for convenience.
pub use enums::{AnticipatedDirection, ComparisonOperator, ConsequentSign, ContextKey, Tendency};
pub use ids::{AgentId, ArchetypeRule, LayerKey, RuleId};
pub use value::{Value, ValueKind};
