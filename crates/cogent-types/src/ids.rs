//! Type-safe identifiers for agents and rules.
//!
//! Agents are named by the integrating domain (e.g. `"HH1"`), so
//! [`AgentId`] wraps a string. Rules are addressed by their position in the
//! rule base: the rule set, the layer inside it, and the per-layer insertion
//! number. [`RuleId`] is `Copy` and totally ordered so it can key maps
//! without cloning strings on every lookup.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around a [`String`] name with standard derives.
macro_rules! define_name_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create an identifier from anything string-like.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(String::from(name))
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                Self(name)
            }
        }
    };
}

define_name_id! {
    /// Unique identifier for an agent in the simulation.
    AgentId
}

/// Position-derived identifier of a rule (decision option).
///
/// `set` and `layer` are 1-based positions, `number` is the insertion-order
/// tiebreak number inside the layer. Displayed as `RS{set}_L{layer}_R{number}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId {
    /// 1-based position of the owning rule set.
    pub set: u16,
    /// 1-based position of the owning layer within its set.
    pub layer: u16,
    /// Insertion-order number within the layer.
    pub number: u32,
}

impl RuleId {
    /// Construct a rule id from its three coordinates.
    pub const fn new(set: u16, layer: u16, number: u32) -> Self {
        Self { set, layer, number }
    }

    /// The `(set, layer)` pair this rule belongs to.
    pub const fn layer_key(self) -> LayerKey {
        LayerKey {
            set: self.set,
            layer: self.layer,
        }
    }
}

impl core::fmt::Display for RuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RS{}_L{}_R{}", self.set, self.layer, self.number)
    }
}

/// Address of a rule layer inside an archetype's rule base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerKey {
    /// 1-based position of the owning rule set.
    pub set: u16,
    /// 1-based position of the layer within its set.
    pub layer: u16,
}

impl LayerKey {
    /// Construct a layer key.
    pub const fn new(set: u16, layer: u16) -> Self {
        Self { set, layer }
    }
}

impl core::fmt::Display for LayerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RS{}_L{}", self.set, self.layer)
    }
}

/// A rule qualified by the archetype whose rule base owns it.
///
/// Rule ids are positional, so two archetypes can both hold an `RS1_L1_R2`.
/// Displayed as `{archetype}:{rule}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArchetypeRule {
    /// Name of the owning archetype.
    pub archetype: String,
    /// Rule inside that archetype's rule base.
    pub rule: RuleId,
}

impl ArchetypeRule {
    /// Qualify `rule` with its archetype name.
    pub fn new(archetype: impl Into<String>, rule: RuleId) -> Self {
        Self {
            archetype: archetype.into(),
            rule,
        }
    }
}

impl core::fmt::Display for ArchetypeRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.archetype, self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_id_display_uses_positions() {
        let id = RuleId::new(2, 1, 7);
        assert_eq!(id.to_string(), "RS2_L1_R7");
        assert_eq!(id.layer_key(), LayerKey::new(2, 1));
        assert_eq!(id.layer_key().to_string(), "RS2_L1");
    }

    #[test]
    fn rule_ids_order_by_set_then_layer_then_number() {
        let mut ids = vec![
            RuleId::new(2, 1, 1),
            RuleId::new(1, 2, 1),
            RuleId::new(1, 1, 3),
            RuleId::new(1, 1, 2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                RuleId::new(1, 1, 2),
                RuleId::new(1, 1, 3),
                RuleId::new(1, 2, 1),
                RuleId::new(2, 1, 1),
            ]
        );
    }

    #[test]
    fn archetype_rules_with_equal_positions_stay_distinct() {
        let fisher = ArchetypeRule::new("Fisher", RuleId::new(1, 1, 2));
        let trader = ArchetypeRule::new("Trader", RuleId::new(1, 1, 2));
        assert_ne!(fisher, trader);
        assert!(fisher < trader);
        assert_eq!(fisher.to_string(), "Fisher:RS1_L1_R2");
    }

    #[test]
    fn agent_id_serializes_transparently() {
        let id = AgentId::new("HH1");
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json.as_deref(), Some("\"HH1\""));
        assert_eq!(id.to_string(), "HH1");
    }
}
