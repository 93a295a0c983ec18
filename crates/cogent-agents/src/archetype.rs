//! Archetypes: shared templates agents are instantiated from.
//!
//! An archetype owns the shared variable store, the goal list and the rule
//! base. The rule base is built eagerly from the flat rule list of an
//! [`ArchetypeDefinition`] into ordered [`RuleSet`]s of [`RuleLayer`]s.

use std::collections::BTreeMap;

use cogent_types::{LayerKey, RuleId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AgentError;
use crate::goal::Goal;
use crate::layer::{RuleLayer, RuleLayerConfig};
use crate::rule::{AppliedConsequent, Rule, RuleDefinition};
use crate::variables::Variables;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Configuration of one rule set in an archetype definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetDefinition {
    /// Goals this set serves. Empty means every archetype goal.
    #[serde(default)]
    pub associated_goals: Vec<String>,
    /// Layer configurations in position order.
    pub layers: Vec<RuleLayerConfig>,
}

/// Serializable description of an archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeDefinition {
    /// Unique archetype name; doubles as the agent type for grouping.
    pub name: String,
    /// Prefix used when naming agents of this archetype.
    #[serde(default)]
    pub name_prefix: String,
    /// Shared ("common") variables.
    #[serde(default)]
    pub variables: Variables,
    /// Goals in definition order.
    pub goals: Vec<Goal>,
    /// Rule sets in position order.
    pub rule_sets: Vec<RuleSetDefinition>,
    /// Flat rule list; each rule names its set and layer.
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    /// Boost the importance of low-confidence goals during ranking.
    #[serde(default = "default_use_importance_adjusting")]
    pub use_importance_adjusting: bool,
    /// Anticipated influence of do-nothing rules, keyed by goal name.
    #[serde(default)]
    pub do_nothing_influence: BTreeMap<String, f64>,
}

const fn default_use_importance_adjusting() -> bool {
    true
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// An ordered group of layers serving a subset of the archetype's goals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// 1-based position in the archetype.
    pub position: u16,
    /// Goals this set serves.
    pub associated_goals: Vec<String>,
    /// Layers in position order.
    pub layers: Vec<RuleLayer>,
}

impl RuleSet {
    /// Whether the set serves the named goal.
    pub fn serves(&self, goal: &str) -> bool {
        self.associated_goals.iter().any(|g| g == goal)
    }
}

// ---------------------------------------------------------------------------
// Archetype
// ---------------------------------------------------------------------------

/// The shared template a group of agents is instantiated from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archetype {
    /// Unique archetype name.
    pub name: String,
    /// Prefix used when naming agents of this archetype.
    pub name_prefix: String,
    /// Shared ("common") variables.
    pub variables: Variables,
    /// Goals in definition order.
    pub goals: Vec<Goal>,
    /// Boost the importance of low-confidence goals during ranking.
    pub use_importance_adjusting: bool,
    /// Anticipated influence of do-nothing rules, keyed by goal name.
    pub do_nothing_influence: BTreeMap<String, f64>,
    rule_sets: Vec<RuleSet>,
}

impl Archetype {
    /// Build an archetype and its rule base from a definition.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidDefinition`] when a rule names a set or
    /// layer that does not exist, or a set names an unknown goal.
    pub fn from_definition(definition: ArchetypeDefinition) -> Result<Self, AgentError> {
        let ArchetypeDefinition {
            name,
            name_prefix,
            variables,
            goals,
            rule_sets: set_definitions,
            rules,
            use_importance_adjusting,
            do_nothing_influence,
        } = definition;

        let mut rule_sets = Vec::with_capacity(set_definitions.len());
        for (set_index, set_definition) in set_definitions.into_iter().enumerate() {
            let position = position_from_index(set_index)?;
            for goal in &set_definition.associated_goals {
                if !goals.iter().any(|g| &g.name == goal) {
                    return Err(AgentError::InvalidDefinition {
                        reason: format!("rule set {position} references unknown goal {goal}"),
                    });
                }
            }
            let associated_goals = if set_definition.associated_goals.is_empty() {
                goals.iter().map(|g| g.name.clone()).collect()
            } else {
                set_definition.associated_goals
            };
            let mut layers = Vec::with_capacity(set_definition.layers.len());
            for (layer_index, config) in set_definition.layers.into_iter().enumerate() {
                let key = LayerKey::new(position, position_from_index(layer_index)?);
                layers.push(RuleLayer::new(key, config));
            }
            rule_sets.push(RuleSet {
                position,
                associated_goals,
                layers,
            });
        }

        let mut archetype = Self {
            name,
            name_prefix,
            variables,
            goals,
            use_importance_adjusting,
            do_nothing_influence,
            rule_sets,
        };

        for definition in rules {
            let key = LayerKey::new(definition.set, definition.layer);
            let layer = archetype
                .layer_mut(key)
                .map_err(|err| AgentError::InvalidDefinition {
                    reason: format!("rule references a missing layer: {err}"),
                })?;
            let id = layer.push(definition.into_rule(RuleId::new(key.set, key.layer, 0)));
            if layer.len() > layer.config.max_rules {
                return Err(AgentError::InvalidDefinition {
                    reason: format!("layer {key} exceeds its capacity with rule {id}"),
                });
            }
        }

        debug!(
            archetype = %archetype.name,
            rule_sets = archetype.rule_sets.len(),
            rules = archetype.rules().count(),
            "Archetype built"
        );
        Ok(archetype)
    }

    /// Rule sets in position order.
    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    /// Every rule in set, layer, insertion order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rule_sets
            .iter()
            .flat_map(|set| set.layers.iter())
            .flat_map(|layer| layer.rules().iter())
    }

    /// Every layer in set, layer order.
    pub fn layers(&self) -> impl Iterator<Item = &RuleLayer> {
        self.rule_sets.iter().flat_map(|set| set.layers.iter())
    }

    /// Look up a goal by name.
    pub fn goal(&self, name: &str) -> Result<&Goal, AgentError> {
        self.goals
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| AgentError::UnknownGoal(String::from(name)))
    }

    /// Look up a rule set by position.
    pub fn rule_set(&self, position: u16) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|s| s.position == position)
    }

    /// Look up a layer.
    pub fn layer(&self, key: LayerKey) -> Result<&RuleLayer, AgentError> {
        self.rule_set(key.set)
            .and_then(|set| set.layers.iter().find(|l| l.key == key))
            .ok_or(AgentError::UnknownLayer(key))
    }

    /// Look up a layer mutably.
    pub fn layer_mut(&mut self, key: LayerKey) -> Result<&mut RuleLayer, AgentError> {
        self.rule_sets
            .iter_mut()
            .find(|s| s.position == key.set)
            .and_then(|set| set.layers.iter_mut().find(|l| l.key == key))
            .ok_or(AgentError::UnknownLayer(key))
    }

    /// Look up a rule.
    pub fn rule(&self, id: RuleId) -> Result<&Rule, AgentError> {
        self.layer(id.layer_key())
            .ok()
            .and_then(|layer| layer.rule(id))
            .ok_or(AgentError::UnknownRule(id))
    }

    /// Whether the rule exists.
    pub fn contains_rule(&self, id: RuleId) -> bool {
        self.rule(id).is_ok()
    }

    /// Number of layers in the rule set a layer belongs to.
    pub fn layer_count(&self, set: u16) -> usize {
        self.rule_set(set).map_or(0, |s| s.layers.len())
    }

    /// Remove a rule from its layer.
    pub fn remove_rule(&mut self, id: RuleId) -> Option<Rule> {
        self.layer_mut(id.layer_key()).ok()?.remove(id)
    }

    /// Apply a rule's consequent to an agent's private store, using this
    /// archetype's shared store as the overlay base.
    pub fn apply_rule(
        &mut self,
        id: RuleId,
        private: &mut Variables,
    ) -> Result<Option<AppliedConsequent>, AgentError> {
        let Self {
            rule_sets,
            variables,
            ..
        } = self;
        let rule = rule_sets
            .iter()
            .find(|s| s.position == id.set)
            .and_then(|set| set.layers.iter().find(|l| l.key == id.layer_key()))
            .and_then(|layer| layer.rule(id))
            .ok_or(AgentError::UnknownRule(id))?;
        rule.apply(private, variables)
    }

    /// The first layer serving `goal` that has resolvable consequent bounds.
    pub fn bounded_layer_for(&self, goal: &str) -> Option<&RuleLayer> {
        self.rule_sets
            .iter()
            .filter(|set| set.serves(goal))
            .flat_map(|set| set.layers.iter())
            .find(|layer| layer.config.has_bounds())
    }

    /// The influence row given to do-nothing rules for the listed goals.
    pub fn do_nothing_row<'a>(&self, goals: impl IntoIterator<Item = &'a String>) -> BTreeMap<String, f64> {
        goals
            .into_iter()
            .map(|g| (g.clone(), self.do_nothing_influence.get(g).copied().unwrap_or(0.0)))
            .collect()
    }
}

fn position_from_index(index: usize) -> Result<u16, AgentError> {
    index
        .checked_add(1)
        .and_then(|p| u16::try_from(p).ok())
        .ok_or_else(|| AgentError::InvalidDefinition {
            reason: String::from("too many rule sets or layers"),
        })
}
