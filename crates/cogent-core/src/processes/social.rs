//! Social learning: adopt rules connected agents activated last iteration.
//!
//! For each layer an agent visits its connections in a fresh random order.
//! Any rule a neighbour activated in that layer which the agent does not
//! hold is assigned together with the neighbour's influence row, restricted
//! to the agent's own goals. Only neighbours of the same archetype share a
//! rule base, so only they can teach.

use std::collections::BTreeMap;

use cogent_agents::Population;
use cogent_types::{AgentId, RuleId};
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::domain::DecisionContext;
use crate::error::EngineError;
use crate::history::IterationSnapshot;

/// Run social learning for one agent. Returns the adopted rules.
pub fn learn<C: DecisionContext>(
    population: &mut Population,
    agent: usize,
    prior: &IterationSnapshot<C>,
    rng: &mut impl Rng,
) -> Result<Vec<RuleId>, EngineError> {
    let (learner, archetype) = population.pair(agent)?;
    let layers: Vec<_> = archetype.layers().map(|l| l.key).collect();
    let mut neighbours: Vec<AgentId> = learner.connections.clone();

    let mut adoptions: Vec<(RuleId, BTreeMap<String, f64>)> = Vec::new();
    for layer in layers {
        neighbours.shuffle(rng);
        for neighbour_id in &neighbours {
            let Ok(neighbour) = population.agent(neighbour_id) else {
                continue;
            };
            if neighbour.archetype != learner.archetype || !neighbour.active {
                continue;
            }
            let Some(state) = prior.state(neighbour_id) else {
                continue;
            };
            for history in state.histories.values() {
                let Some(rule) = history.activated_in(layer) else {
                    continue;
                };
                let known = learner.holds(rule) || adoptions.iter().any(|(id, _)| *id == rule);
                if known || !archetype.contains_rule(rule) {
                    continue;
                }
                let row: BTreeMap<String, f64> = neighbour
                    .influence_row(rule)
                    .into_iter()
                    .flatten()
                    .filter(|(goal, _)| learner.has_goal(goal))
                    .map(|(goal, &value)| (goal.clone(), value))
                    .collect();
                adoptions.push((rule, row));
            }
        }
    }

    let (learner, _) = population.split_mut(agent)?;
    let mut adopted = Vec::with_capacity(adoptions.len());
    for (rule, row) in adoptions {
        if learner.assign_rule(rule, row) {
            debug!(agent = %learner.id, rule = %rule, "Rule adopted from neighbour");
            adopted.push(rule);
        }
    }
    Ok(adopted)
}
