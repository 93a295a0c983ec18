//! Counterfactual thinking: would another rule matched last iteration have
//! served the goal better than the one the agent activated?
//!
//! A successful counterfactual restores the goal's confidence, which spares
//! the layer from innovation this iteration.

use cogent_agents::{Agent, Archetype, GoalState};
use cogent_types::{RuleId, Tendency};
use tracing::debug;

use super::extreme_group;
use crate::error::EngineError;

const PROCESS: &str = "counterfactual thinking";

/// Decide whether a better alternative existed among `matched`.
///
/// `matched` and `activated` come from the previous iteration's history of
/// the layer and context. Only rules the agent still holds are considered.
/// Returns `true` when the best group contains an action rule other than
/// the one activated.
pub fn think(
    agent: &Agent,
    archetype: &Archetype,
    goal: &str,
    goal_state: &GoalState,
    matched: &[RuleId],
    activated: Option<RuleId>,
) -> Result<bool, EngineError> {
    let tendency = archetype.goal(goal)?.tendency;
    let scored: Vec<(RuleId, f64)> = matched
        .iter()
        .copied()
        .filter(|id| agent.holds(*id))
        .map(|id| (id, agent.influence(id, goal)))
        .collect();

    let best = match tendency {
        Tendency::Maximize => extreme_group(&scored, |a, b| a > b),
        Tendency::AtOrAboveFocal => {
            let qualifying: Vec<(RuleId, f64)> = scored
                .iter()
                .map(|&(id, influence)| (id, goal_state.diff_current_and_focal + influence))
                .filter(|&(_, projected)| projected >= 0.0)
                .collect();
            extreme_group(&qualifying, |a, b| a < b)
        }
        Tendency::Minimize | Tendency::AtOrBelowFocal => {
            return Err(EngineError::UnsupportedTendency {
                process: PROCESS,
                tendency,
            });
        }
    };

    let success = best.iter().any(|&id| {
        Some(id) != activated && archetype.rule(id).is_ok_and(|rule| rule.is_action)
    });
    debug!(
        agent = %agent.id,
        goal,
        candidates = scored.len(),
        best = best.len(),
        success,
        "Counterfactual thinking"
    );
    Ok(success)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use cogent_agents::{
        AntecedentPart, ArchetypeDefinition, Consequent, Goal, RuleDefinition, RuleLayerConfig,
        RuleSetDefinition,
    };
    use cogent_types::{AgentId, ComparisonOperator};

    use super::*;

    fn setup(tendency: Tendency) -> (Archetype, Agent) {
        let rule = |effort: f64| RuleDefinition {
            set: 1,
            layer: 1,
            antecedent: vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 0.0)],
            consequent: Consequent::new("Effort", effort),
            required_participants: None,
            is_modifiable: false,
        };
        let archetype = Archetype::from_definition(ArchetypeDefinition {
            name: String::from("Fisher"),
            name_prefix: String::from("F"),
            variables: cogent_agents::Variables::new(),
            goals: vec![Goal::new("Income", tendency, "Income")],
            rule_sets: vec![RuleSetDefinition {
                associated_goals: Vec::new(),
                layers: vec![RuleLayerConfig::default()],
            }],
            rules: vec![rule(1.0), rule(2.0)],
            use_importance_adjusting: true,
            do_nothing_influence: BTreeMap::new(),
        })
        .unwrap();
        let mut agent = Agent::new(AgentId::new("F1"), &archetype);
        agent.assign_rule(RuleId::new(1, 1, 1), [(String::from("Income"), 5.0)].into_iter().collect());
        agent.assign_rule(RuleId::new(1, 1, 2), [(String::from("Income"), 10.0)].into_iter().collect());
        (archetype, agent)
    }

    fn matched() -> Vec<RuleId> {
        vec![RuleId::new(1, 1, 0), RuleId::new(1, 1, 1), RuleId::new(1, 1, 2)]
    }

    #[test]
    fn maximize_succeeds_when_another_rule_was_better() {
        let (archetype, agent) = setup(Tendency::Maximize);
        let state = GoalState::new(3.0, 3.0, 1.0);
        let found = think(&agent, &archetype, "Income", &state, &matched(), Some(RuleId::new(1, 1, 1)));
        assert!(found.unwrap());
    }

    #[test]
    fn maximize_fails_when_the_activated_rule_was_best() {
        let (archetype, agent) = setup(Tendency::Maximize);
        let state = GoalState::new(3.0, 3.0, 1.0);
        let found = think(&agent, &archetype, "Income", &state, &matched(), Some(RuleId::new(1, 1, 2)));
        assert!(!found.unwrap());
    }

    #[test]
    fn at_or_above_picks_the_smallest_sufficient_rule() {
        let (archetype, agent) = setup(Tendency::AtOrAboveFocal);
        // 7 short of focal: only the +10 rule closes the gap.
        let state = GoalState::new(3.0, 10.0, 1.0);
        let found = think(&agent, &archetype, "Income", &state, &matched(), Some(RuleId::new(1, 1, 2)));
        assert!(!found.unwrap());
        let found = think(&agent, &archetype, "Income", &state, &matched(), Some(RuleId::new(1, 1, 1)));
        assert!(found.unwrap());
    }

    #[test]
    fn no_qualifying_candidate_means_no_confidence() {
        let (archetype, agent) = setup(Tendency::AtOrAboveFocal);
        let state = GoalState::new(0.0, 100.0, 1.0);
        let found = think(&agent, &archetype, "Income", &state, &matched(), None);
        assert!(!found.unwrap());
        let found = think(&agent, &archetype, "Income", &state, &[], None);
        assert!(!found.unwrap());
    }

    #[test]
    fn minimize_is_unsupported() {
        let (archetype, agent) = setup(Tendency::Minimize);
        let state = GoalState::new(0.0, 0.0, 1.0);
        let result = think(&agent, &archetype, "Income", &state, &matched(), None);
        assert!(matches!(result, Err(EngineError::UnsupportedTendency { .. })));
    }
}
