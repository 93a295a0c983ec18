//! Per-iteration agent snapshots.
//!
//! One [`AgentState`] exists per agent per iteration. It holds the agent's
//! [`GoalState`]s, a [`RuleHistory`] per decision context, and the log of
//! actions taken. [`AgentState::next_iteration`] carries goal states forward
//! through [`GoalState::next_iteration`] and opens an empty history for
//! every known context. Rule activity is never copied forward.

use std::collections::BTreeMap;

use cogent_types::{AnticipatedDirection, ContextKey, LayerKey, RuleId, Value};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::variables::StoredValue;

// ---------------------------------------------------------------------------
// GoalState
// ---------------------------------------------------------------------------

/// How an agent currently stands with respect to one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalState {
    /// Live value of the goal's reference variable.
    pub value: f64,
    /// Value in the previous iteration.
    pub prior_value: f64,
    /// Target value the goal is judged against.
    pub focal_value: f64,
    /// Focal value in the previous iteration.
    pub prior_focal_value: f64,
    /// Configured importance, in `[0, 1]`.
    pub importance: f64,
    /// Importance after the confidence-driven competition.
    pub adjusted_importance: f64,
    /// Whether the prior choice is still considered adequate.
    pub confidence: bool,
    /// Direction the agent expects it must push the value.
    pub anticipated_direction: AnticipatedDirection,
    /// Last observed effect, written into the influence matrix.
    pub anticipated_influence: f64,
    /// `value - focal_value`.
    pub diff_current_and_focal: f64,
    /// `prior_value - prior_focal_value`.
    pub diff_prior_and_focal: f64,
    /// `value - prior_value`.
    pub diff_current_and_prior: f64,
    /// `prior_value` minus the value two iterations back.
    pub diff_prior_and_twice_prior: f64,
}

impl GoalState {
    /// A first-iteration goal state.
    pub const fn new(value: f64, focal_value: f64, importance: f64) -> Self {
        Self {
            value,
            prior_value: value,
            focal_value,
            prior_focal_value: focal_value,
            importance,
            adjusted_importance: importance,
            confidence: true,
            anticipated_direction: AnticipatedDirection::Stay,
            anticipated_influence: 0.0,
            diff_current_and_focal: value - focal_value,
            diff_prior_and_focal: value - focal_value,
            diff_current_and_prior: 0.0,
            diff_prior_and_twice_prior: 0.0,
        }
    }

    /// The state this goal starts the next iteration with.
    ///
    /// The current value becomes the prior, importance resets to its
    /// configured level, and the current-vs-prior delta shifts into the
    /// prior-vs-twice-prior slot.
    #[must_use]
    pub const fn next_iteration(&self) -> Self {
        Self {
            value: self.value,
            prior_value: self.value,
            focal_value: self.focal_value,
            prior_focal_value: self.focal_value,
            importance: self.importance,
            adjusted_importance: self.importance,
            confidence: self.confidence,
            anticipated_direction: self.anticipated_direction,
            anticipated_influence: 0.0,
            diff_current_and_focal: self.diff_current_and_focal,
            diff_prior_and_focal: self.diff_current_and_focal,
            diff_current_and_prior: 0.0,
            diff_prior_and_twice_prior: self.diff_current_and_prior,
        }
    }
}

// ---------------------------------------------------------------------------
// RuleHistory
// ---------------------------------------------------------------------------

/// A variable written while selecting in a multi-layer rule set, with the
/// store entries before and right after the write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverwrittenVariable {
    /// Layer whose selection wrote the variable.
    pub layer: LayerKey,
    /// Variable name.
    pub name: String,
    /// Entries before the write.
    pub before: StoredValue,
    /// Entries right after the write.
    pub after: StoredValue,
}

/// Rule activity of one agent in one decision context during one iteration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleHistory {
    /// Rules whose antecedents held during selection.
    pub matched: Vec<RuleId>,
    /// Rules selected, at most one per layer.
    pub activated: Vec<RuleId>,
    /// Collective rules that failed their quorum this iteration.
    pub blocked: Vec<RuleId>,
    /// Writes made by selection in multi-layer sets, in write order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overwritten: Vec<OverwrittenVariable>,
}

impl RuleHistory {
    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
            && self.activated.is_empty()
            && self.blocked.is_empty()
            && self.overwritten.is_empty()
    }

    /// The rule activated in a layer, if any.
    pub fn activated_in(&self, layer: LayerKey) -> Option<RuleId> {
        self.activated.iter().copied().find(|id| id.layer_key() == layer)
    }

    /// Rules matched in a layer.
    pub fn matched_in(&self, layer: LayerKey) -> Vec<RuleId> {
        self.matched
            .iter()
            .copied()
            .filter(|id| id.layer_key() == layer)
            .collect()
    }

    /// Whether the rule was blocked this iteration.
    pub fn is_blocked(&self, rule: RuleId) -> bool {
        self.blocked.contains(&rule)
    }

    /// Record a layer's selection outcome, replacing earlier records for the
    /// same layer.
    pub fn record_selection(&mut self, layer: LayerKey, activated: RuleId, matched: &[RuleId]) {
        self.activated.retain(|id| id.layer_key() != layer);
        self.matched.retain(|id| id.layer_key() != layer);
        self.activated.push(activated);
        self.matched.extend_from_slice(matched);
    }

    /// Log the writes a layer's selection made, replacing earlier ones for
    /// the same layer.
    pub fn record_overwrites(&mut self, layer: LayerKey, writes: Vec<OverwrittenVariable>) {
        self.overwritten.retain(|w| w.layer != layer);
        self.overwritten.extend(writes);
    }

    /// Remove and return the writes of `layer` and every later layer of its
    /// set, in write order.
    pub fn take_overwrites_from(&mut self, layer: LayerKey) -> Vec<OverwrittenVariable> {
        let (taken, kept) = self
            .overwritten
            .drain(..)
            .partition(|w| w.layer.set == layer.set && w.layer.layer >= layer.layer);
        self.overwritten = kept;
        taken
    }

    /// Move an activated rule to the blocked list.
    pub fn block(&mut self, rule: RuleId) {
        self.activated.retain(|id| *id != rule);
        if !self.blocked.contains(&rule) {
            self.blocked.push(rule);
        }
    }
}

/// One consequent application recorded by action taking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakenAction {
    /// The rule applied.
    pub rule: RuleId,
    /// The variable written.
    pub variable: String,
    /// The value written.
    pub value: Value,
}

// ---------------------------------------------------------------------------
// AgentState
// ---------------------------------------------------------------------------

/// An agent's snapshot for one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: Deserialize<'de> + Ord"
))]
pub struct AgentState<C> {
    /// Goal states keyed by goal name.
    pub goals: BTreeMap<String, GoalState>,
    /// Rule histories keyed by decision context.
    #[serde(with = "pairs")]
    pub histories: BTreeMap<ContextKey<C>, RuleHistory>,
    /// Actions taken, keyed by decision context.
    #[serde(with = "pairs")]
    pub taken_actions: BTreeMap<ContextKey<C>, Vec<TakenAction>>,
}

impl<C: Ord + Clone> AgentState<C> {
    /// A state with the given goals and an empty history per context.
    pub fn new(goals: BTreeMap<String, GoalState>, contexts: impl IntoIterator<Item = ContextKey<C>>) -> Self {
        let histories = contexts
            .into_iter()
            .map(|key| (key, RuleHistory::default()))
            .collect();
        Self {
            goals,
            histories,
            taken_actions: BTreeMap::new(),
        }
    }

    /// Look up a goal state.
    pub fn goal(&self, name: &str) -> Result<&GoalState, AgentError> {
        self.goals
            .get(name)
            .ok_or_else(|| AgentError::UnknownGoal(String::from(name)))
    }

    /// Look up a goal state mutably.
    pub fn goal_mut(&mut self, name: &str) -> Result<&mut GoalState, AgentError> {
        self.goals
            .get_mut(name)
            .ok_or_else(|| AgentError::UnknownGoal(String::from(name)))
    }

    /// Known decision contexts in key order.
    pub fn contexts(&self) -> impl Iterator<Item = &ContextKey<C>> {
        self.histories.keys()
    }

    /// The history of a context, if known.
    pub fn history(&self, context: &ContextKey<C>) -> Option<&RuleHistory> {
        self.histories.get(context)
    }

    /// The history of a context, opened if unknown.
    pub fn history_mut(&mut self, context: &ContextKey<C>) -> &mut RuleHistory {
        self.histories.entry(context.clone()).or_default()
    }

    /// Every activated rule across all contexts.
    pub fn activated_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.histories.values().flat_map(|h| h.activated.iter().copied())
    }

    /// Append a taken action for a context.
    pub fn record_taken(&mut self, context: &ContextKey<C>, action: TakenAction) {
        self.taken_actions
            .entry(context.clone())
            .or_default()
            .push(action);
    }

    /// The snapshot the agent starts the next iteration with.
    #[must_use]
    pub fn next_iteration(&self) -> Self {
        Self {
            goals: self
                .goals
                .iter()
                .map(|(name, state)| (name.clone(), state.next_iteration()))
                .collect(),
            histories: self
                .histories
                .keys()
                .map(|key| (key.clone(), RuleHistory::default()))
                .collect(),
            taken_actions: BTreeMap::new(),
        }
    }
}

/// Serialize maps with structured keys as sequences of `(key, value)` pairs.
mod pairs {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
