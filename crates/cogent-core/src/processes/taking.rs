//! Action taking: apply the rules an agent activated in one context.

use cogent_agents::{AgentState, Population, TakenAction};
use cogent_types::{ContextKey, RuleId};
use tracing::trace;

use crate::domain::DecisionContext;
use crate::error::EngineError;

/// Apply every rule activated in `context`, in set and layer order, and
/// log what each wrote. Do-nothing rules write nothing and are not logged.
pub fn take<C: DecisionContext>(
    population: &mut Population,
    agent: usize,
    context: &ContextKey<C>,
    state: &mut AgentState<C>,
) -> Result<Vec<TakenAction>, EngineError> {
    let mut activated: Vec<RuleId> = state
        .history(context)
        .map(|h| h.activated.clone())
        .unwrap_or_default();
    activated.sort_unstable();

    let (actor, archetype) = population.split_mut(agent)?;
    let mut taken = Vec::new();
    for rule in activated {
        let Some(applied) = archetype.apply_rule(rule, &mut actor.variables)? else {
            continue;
        };
        trace!(agent = %actor.id, rule = %rule, variable = %applied.variable, "Action taken");
        let action = TakenAction {
            rule,
            variable: applied.variable,
            value: applied.value,
        };
        state.record_taken(context, action.clone());
        taken.push(action);
    }
    Ok(taken)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use cogent_agents::{
        Agent, AntecedentPart, Archetype, ArchetypeDefinition, Consequent, Goal, RuleDefinition,
        RuleLayerConfig, RuleSetDefinition, Variables,
    };
    use cogent_types::{AgentId, ComparisonOperator, Tendency, Value};

    use super::*;

    fn population() -> Population {
        let rule = |layer: u16, variable: &str, value: f64| RuleDefinition {
            set: 1,
            layer,
            antecedent: vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 0.0)],
            consequent: Consequent::new(variable, value),
            required_participants: None,
            is_modifiable: false,
        };
        let archetype = Archetype::from_definition(ArchetypeDefinition {
            name: String::from("Fisher"),
            name_prefix: String::from("F"),
            variables: Variables::new(),
            goals: vec![Goal::new("Income", Tendency::Maximize, "Income")],
            rule_sets: vec![RuleSetDefinition {
                associated_goals: Vec::new(),
                layers: vec![RuleLayerConfig::default(), RuleLayerConfig::default()],
            }],
            rules: vec![rule(1, "Effort", 3.0), rule(2, "Boats", 2.0)],
            use_importance_adjusting: true,
            do_nothing_influence: BTreeMap::new(),
        })
        .unwrap();
        let agent = Agent::new(AgentId::new("F1"), &archetype);
        let mut population = Population::new();
        population.add_archetype(archetype).unwrap();
        population.add_agent(agent).unwrap();
        population
    }

    #[test]
    fn applies_action_rules_in_layer_order() {
        let mut population = population();
        let mut state: AgentState<u8> = AgentState::new(BTreeMap::new(), [ContextKey::Unbound]);
        let history = state.history_mut(&ContextKey::Unbound);
        history.activated = vec![RuleId::new(1, 2, 1), RuleId::new(1, 1, 1)];

        let taken = take(&mut population, 0, &ContextKey::Unbound, &mut state).unwrap();
        let variables: Vec<&str> = taken.iter().map(|t| t.variable.as_str()).collect();
        assert_eq!(variables, ["Effort", "Boats"]);
        let agent = population.agent(&AgentId::new("F1")).unwrap();
        assert_eq!(agent.variables.get("Effort"), Some(&Value::Number(3.0)));
        assert_eq!(state.taken_actions[&ContextKey::Unbound].len(), 2);
    }

    #[test]
    fn do_nothing_writes_nothing() {
        let mut population = population();
        let mut state: AgentState<u8> = AgentState::new(BTreeMap::new(), [ContextKey::Unbound]);
        state.history_mut(&ContextKey::Unbound).activated = vec![RuleId::new(1, 1, 0)];
        let taken = take(&mut population, 0, &ContextKey::Unbound, &mut state).unwrap();
        assert!(taken.is_empty());
        assert!(state.taken_actions.is_empty());
    }
}
