//! Runtime agents: identity, assigned goals and rules, learned influences.
//!
//! An [`Agent`] never owns rules. It holds [`RuleId`]s into its archetype's
//! rule base together with two per-rule tables:
//!
//! - the anticipation-influence matrix, mapping `(rule, goal)` to the
//!   agent's expected effect of the rule on the goal;
//! - the freshness counters, the number of iterations since the rule was
//!   last activated (reset to zero on assignment and activation).
//!
//! Variable access goes through the private-over-shared overlay described in
//! [`crate::variables`]; the caller passes the archetype's shared store.

use std::collections::{BTreeMap, BTreeSet};

use cogent_types::{AgentId, LayerKey, RuleId, Value};
use serde::{Deserialize, Serialize};

use crate::archetype::Archetype;
use crate::error::AgentError;
use crate::variables::{self, HOUSEHOLD_VARIABLE, Variables};

/// A simulated decision maker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent id.
    pub id: AgentId,
    /// Name of the archetype this agent was instantiated from.
    pub archetype: String,
    /// Private variables, shadowing the archetype's shared ones.
    pub variables: Variables,
    /// Assigned goal names, in assignment order.
    pub goals: Vec<String>,
    /// Social connections (household or network peers).
    pub connections: Vec<AgentId>,
    /// Inactive agents are skipped by every process.
    pub active: bool,
    assigned: BTreeSet<RuleId>,
    influence: BTreeMap<RuleId, BTreeMap<String, f64>>,
    freshness: BTreeMap<RuleId, u32>,
}

impl Agent {
    /// Create an agent holding every archetype goal and every do-nothing
    /// rule, the latter with the archetype's default influence row.
    pub fn new(id: AgentId, archetype: &Archetype) -> Self {
        let goals: Vec<String> = archetype.goals.iter().map(|g| g.name.clone()).collect();
        let mut agent = Self {
            id,
            archetype: archetype.name.clone(),
            variables: Variables::new(),
            goals,
            connections: Vec::new(),
            active: true,
            assigned: BTreeSet::new(),
            influence: BTreeMap::new(),
            freshness: BTreeMap::new(),
        };
        agent.assign_do_nothing(archetype);
        agent
    }

    /// Restrict the agent to a subset of the archetype's goals.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownGoal`] for a name the archetype lacks.
    pub fn set_goals(&mut self, archetype: &Archetype, goals: Vec<String>) -> Result<(), AgentError> {
        for goal in &goals {
            archetype.goal(goal)?;
        }
        self.goals = goals;
        let goals = &self.goals;
        for row in self.influence.values_mut() {
            row.retain(|g, _| goals.contains(g));
            for goal in goals {
                row.entry(goal.clone()).or_insert(0.0);
            }
        }
        Ok(())
    }

    fn assign_do_nothing(&mut self, archetype: &Archetype) {
        let ids: Vec<RuleId> = archetype
            .layers()
            .filter_map(|layer| layer.do_nothing().map(|r| r.id))
            .collect();
        for id in ids {
            let row = archetype.do_nothing_row(self.goals.iter());
            self.assign_rule(id, row);
        }
    }

    /// Whether the agent holds the goal.
    pub fn has_goal(&self, goal: &str) -> bool {
        self.goals.iter().any(|g| g == goal)
    }

    // -----------------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------------

    /// Read a variable, private first, then the archetype's shared store.
    pub fn get_variable<'a>(&'a self, shared: &'a Variables, name: &str) -> Result<&'a Value, AgentError> {
        variables::lookup(&self.variables, shared, name)
    }

    /// Read a numeric variable.
    pub fn number(&self, shared: &Variables, name: &str) -> Result<f64, AgentError> {
        variables::lookup_number(&self.variables, shared, name)
    }

    /// Write a variable through the overlay.
    pub fn set_variable(&mut self, shared: &mut Variables, name: &str, value: impl Into<Value>) {
        variables::store(&mut self.variables, shared, name, value.into());
    }

    /// The agent's household label, if it defines one.
    pub fn household<'a>(&'a self, shared: &'a Variables) -> Option<&'a Value> {
        self.get_variable(shared, HOUSEHOLD_VARIABLE).ok()
    }

    // -----------------------------------------------------------------------
    // Rule assignment
    // -----------------------------------------------------------------------

    /// Assign a rule with an influence row, restricted to the agent's goals
    /// (goals missing from the row start at zero). Returns `false` and
    /// changes nothing if the rule is already held.
    pub fn assign_rule(&mut self, id: RuleId, row: BTreeMap<String, f64>) -> bool {
        if !self.assigned.insert(id) {
            return false;
        }
        let mut restricted: BTreeMap<String, f64> = row
            .into_iter()
            .filter(|(goal, _)| self.goals.contains(goal))
            .collect();
        for goal in &self.goals {
            restricted.entry(goal.clone()).or_insert(0.0);
        }
        self.influence.insert(id, restricted);
        self.freshness.insert(id, 0);
        true
    }

    /// Drop a rule and its bookkeeping. Returns whether it was held.
    pub fn unassign_rule(&mut self, id: RuleId) -> bool {
        self.influence.remove(&id);
        self.freshness.remove(&id);
        self.assigned.remove(&id)
    }

    /// Whether the agent holds the rule.
    pub fn holds(&self, id: RuleId) -> bool {
        self.assigned.contains(&id)
    }

    /// Every held rule in id order.
    pub fn assigned_rules(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.assigned.iter().copied()
    }

    /// Held rules of one layer in id order.
    pub fn assigned_in_layer(&self, layer: LayerKey) -> impl Iterator<Item = RuleId> + '_ {
        self.assigned
            .iter()
            .copied()
            .filter(move |id| id.layer_key() == layer)
    }

    /// Distinct layers the agent holds rules in, in set/layer order.
    pub fn assigned_layers(&self) -> Vec<LayerKey> {
        let layers: BTreeSet<LayerKey> = self.assigned.iter().map(|id| id.layer_key()).collect();
        layers.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Anticipation influence
    // -----------------------------------------------------------------------

    /// Expected effect of a rule on a goal; zero when unknown.
    pub fn influence(&self, rule: RuleId, goal: &str) -> f64 {
        self.influence
            .get(&rule)
            .and_then(|row| row.get(goal))
            .copied()
            .unwrap_or(0.0)
    }

    /// The full influence row of a held rule.
    pub fn influence_row(&self, rule: RuleId) -> Option<&BTreeMap<String, f64>> {
        self.influence.get(&rule)
    }

    /// Overwrite the expected effect of a held rule on a goal.
    pub fn set_influence(&mut self, rule: RuleId, goal: &str, value: f64) {
        if let Some(row) = self.influence.get_mut(&rule) {
            row.insert(String::from(goal), value);
        }
    }

    // -----------------------------------------------------------------------
    // Freshness
    // -----------------------------------------------------------------------

    /// Iterations since the rule was last activated, if held.
    pub fn freshness(&self, rule: RuleId) -> Option<u32> {
        self.freshness.get(&rule).copied()
    }

    /// Reset a held rule's freshness counter.
    pub fn mark_activated(&mut self, rule: RuleId) {
        if let Some(counter) = self.freshness.get_mut(&rule) {
            *counter = 0;
        }
    }

    /// Age every held rule by one iteration.
    pub fn age_rules(&mut self) {
        for counter in self.freshness.values_mut() {
            *counter = counter.saturating_add(1);
        }
    }

    // -----------------------------------------------------------------------
    // Social graph
    // -----------------------------------------------------------------------

    /// Add a one-way connection to another agent.
    pub fn connect(&mut self, other: AgentId) {
        if other != self.id && !self.connections.contains(&other) {
            self.connections.push(other);
        }
    }
}
