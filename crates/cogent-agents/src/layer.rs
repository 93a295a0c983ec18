//! Rule layers: capacity-bounded slots of mutually exclusive rules.

use std::collections::BTreeMap;

use cogent_types::{ConsequentSign, LayerKey, RuleId};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::rule::Rule;
use crate::variables::{self, Variables};

/// Insertion number reserved for a layer's do-nothing rule.
pub const DO_NOTHING_NUMBER: u32 = 0;

/// Default maximum number of rules in a layer.
const DEFAULT_MAX_RULES: usize = 10;

/// Per-layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLayerConfig {
    /// Maximum number of member rules, the do-nothing rule included.
    #[serde(default = "default_max_rules")]
    pub max_rules: usize,
    /// Whether innovation may generate rules in this layer.
    #[serde(default)]
    pub modifiable: bool,
    /// Whether the layer carries a synthesized do-nothing rule.
    #[serde(default = "default_use_do_nothing")]
    pub use_do_nothing: bool,
    /// Static lower bound for generated consequent values.
    #[serde(default)]
    pub consequent_min: Option<f64>,
    /// Static upper bound for generated consequent values.
    #[serde(default)]
    pub consequent_max: Option<f64>,
    /// Agent variable holding the lower bound (wins over the static one).
    #[serde(default)]
    pub min_reference: Option<String>,
    /// Agent variable holding the upper bound (wins over the static one).
    #[serde(default)]
    pub max_reference: Option<String>,
    /// Sign of the consequent/goal relationship, keyed by goal name.
    #[serde(default)]
    pub consequent_signs: BTreeMap<String, ConsequentSign>,
}

const fn default_max_rules() -> usize {
    DEFAULT_MAX_RULES
}

const fn default_use_do_nothing() -> bool {
    true
}

impl Default for RuleLayerConfig {
    fn default() -> Self {
        Self {
            max_rules: DEFAULT_MAX_RULES,
            modifiable: false,
            use_do_nothing: true,
            consequent_min: None,
            consequent_max: None,
            min_reference: None,
            max_reference: None,
            consequent_signs: BTreeMap::new(),
        }
    }
}

impl RuleLayerConfig {
    /// Sign of the relationship with a goal; unlisted goals are positive.
    pub fn sign_for(&self, goal: &str) -> ConsequentSign {
        self.consequent_signs.get(goal).copied().unwrap_or_default()
    }

    /// Whether any bound (static or referenced) is configured.
    pub const fn has_bounds(&self) -> bool {
        (self.consequent_min.is_some() || self.min_reference.is_some())
            && (self.consequent_max.is_some() || self.max_reference.is_some())
    }
}

/// An ordered slot of rules inside a rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleLayer {
    /// Address of the layer.
    pub key: LayerKey,
    /// Capacity and innovation configuration.
    pub config: RuleLayerConfig,
    rules: Vec<Rule>,
    next_number: u32,
}

impl RuleLayer {
    /// Create an empty layer, synthesizing its do-nothing rule if configured.
    pub fn new(key: LayerKey, config: RuleLayerConfig) -> Self {
        let mut rules = Vec::new();
        if config.use_do_nothing {
            rules.push(Rule::do_nothing(RuleId::new(key.set, key.layer, DO_NOTHING_NUMBER)));
        }
        Self {
            key,
            config,
            rules,
            next_number: DO_NOTHING_NUMBER.saturating_add(1),
        }
    }

    /// Member rules in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Number of member rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the layer has no members.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether adding a rule would exceed the configured capacity.
    pub fn is_full(&self) -> bool {
        self.rules.len() >= self.config.max_rules
    }

    /// Look up a member rule.
    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// The synthesized do-nothing rule, if this layer has one.
    pub fn do_nothing(&self) -> Option<&Rule> {
        self.rules.iter().find(|r| !r.is_action)
    }

    /// The id of a structurally identical member, if any.
    pub fn find_similar(&self, candidate: &Rule) -> Option<RuleId> {
        self.rules.iter().find(|r| *r == candidate).map(|r| r.id)
    }

    /// Add a rule, assigning it the next insertion number. Capacity is the
    /// caller's concern.
    pub fn push(&mut self, mut rule: Rule) -> RuleId {
        let id = RuleId::new(self.key.set, self.key.layer, self.next_number);
        self.next_number = self.next_number.saturating_add(1);
        rule.id = id;
        self.rules.push(rule);
        id
    }

    /// Remove a member rule.
    pub fn remove(&mut self, id: RuleId) -> Option<Rule> {
        let index = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(index))
    }

    /// Lower consequent bound for an agent, reference first.
    pub fn min_value(&self, private: &Variables, shared: &Variables) -> Result<f64, AgentError> {
        match (&self.config.min_reference, self.config.consequent_min) {
            (Some(reference), _) => variables::lookup_number(private, shared, reference),
            (None, Some(min)) => Ok(min),
            (None, None) => Err(AgentError::MissingLayerBound {
                layer: self.key,
                bound: "min",
            }),
        }
    }

    /// Upper consequent bound for an agent, reference first.
    pub fn max_value(&self, private: &Variables, shared: &Variables) -> Result<f64, AgentError> {
        match (&self.config.max_reference, self.config.consequent_max) {
            (Some(reference), _) => variables::lookup_number(private, shared, reference),
            (None, Some(max)) => Ok(max),
            (None, None) => Err(AgentError::MissingLayerBound {
                layer: self.key,
                bound: "max",
            }),
        }
    }
}
