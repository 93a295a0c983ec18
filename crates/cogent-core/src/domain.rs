//! The host seam: what an integrating domain supplies to the engine.
//!
//! A [`Domain`] provides the decision contexts each agent governs, the
//! first [`AgentState`] of every agent, and hooks invoked synchronously at
//! fixed points of the iteration. Every hook defaults to a no-op, so a
//! domain only overrides what it needs.
//!
//! The engine is generic over the domain's context type: a site, a
//! management area, or `()` for domains without contexts.

use std::collections::BTreeMap;
use std::fmt::Debug;

use cogent_agents::{Agent, AgentState, Archetype, GoalState, Population, TakenAction};
use cogent_types::{ContextKey, RuleId};

use crate::error::EngineError;

/// Bounds a domain's decision context type must meet.
pub trait DecisionContext: Ord + Clone + Debug {}

impl<T: Ord + Clone + Debug> DecisionContext for T {}

/// An integrating domain simulation.
pub trait Domain {
    /// Opaque decision context key (e.g. a site id).
    type Context: DecisionContext;

    /// Contexts the agent governs this iteration. An empty list puts the
    /// agent's history under [`ContextKey::Unbound`].
    fn contexts(&self, _agent: &Agent, _iteration: u64) -> Vec<Self::Context> {
        Vec::new()
    }

    /// State of an agent in its first iteration.
    ///
    /// The default reads each goal's value from its reference variable,
    /// takes the focal value from the focal reference (or the value
    /// itself), and splits importance evenly across the agent's goals.
    fn initial_state(
        &mut self,
        agent: &Agent,
        archetype: &Archetype,
        contexts: &[ContextKey<Self::Context>],
    ) -> Result<AgentState<Self::Context>, EngineError> {
        default_initial_state(agent, archetype, contexts)
    }

    /// Called before any process runs in an iteration.
    fn pre_iteration(&mut self, _iteration: u64, _population: &mut Population) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called after action taking, before the stoppage check.
    fn post_iteration(&mut self, _iteration: u64, _population: &mut Population) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called once per agent and context before counterfactual thinking.
    fn before_counterfactual_thinking(
        &mut self,
        _agent: &mut Agent,
        _archetype: &mut Archetype,
        _context: &ContextKey<Self::Context>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called after every innovation attempt with the rule assigned, if any.
    fn after_innovation(
        &mut self,
        _agent: &mut Agent,
        _archetype: &mut Archetype,
        _context: &ContextKey<Self::Context>,
        _rule: Option<RuleId>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called once per agent and context before phase I of action selection.
    fn before_action_selection(
        &mut self,
        _agent: &mut Agent,
        _archetype: &mut Archetype,
        _context: &ContextKey<Self::Context>,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called after the activated rules of a context were applied.
    fn after_action_taking(
        &mut self,
        _agent: &mut Agent,
        _archetype: &mut Archetype,
        _context: &ContextKey<Self::Context>,
        _taken: &[TakenAction],
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Mark agents inactive at the end of an iteration.
    fn deactivate(&mut self, _iteration: u64, _population: &mut Population) -> Result<(), EngineError> {
        Ok(())
    }

    /// Add agents at the end of an iteration. New agents receive their
    /// first state through [`Domain::initial_state`] next iteration.
    fn reproduce(&mut self, _iteration: u64, _population: &mut Population) -> Result<(), EngineError> {
        Ok(())
    }
}

/// The initial state [`Domain::initial_state`] builds by default.
pub fn default_initial_state<C: DecisionContext>(
    agent: &Agent,
    archetype: &Archetype,
    contexts: &[ContextKey<C>],
) -> Result<AgentState<C>, EngineError> {
    let share = if agent.goals.is_empty() {
        0.0
    } else {
        // An agent has a handful of goals; the count is exact in f64.
        #[allow(clippy::cast_precision_loss)]
        let count = agent.goals.len() as f64;
        1.0 / count
    };
    let mut goals = BTreeMap::new();
    for name in &agent.goals {
        let goal = archetype.goal(name)?;
        let value = agent.number(&archetype.variables, &goal.reference_variable)?;
        let focal = match &goal.focal_value_reference {
            Some(reference) => agent.number(&archetype.variables, reference)?,
            None => value,
        };
        goals.insert(name.clone(), GoalState::new(value, focal, share));
    }
    Ok(AgentState::new(goals, contexts.iter().cloned()))
}
