//! Two-phase action selection.
//!
//! Phase I picks one rule per layer for every context of an agent:
//!
//! - matched rules are held rules whose antecedents hold and which were not
//!   blocked earlier this iteration
//! - a single match wins outright
//! - otherwise the goal's tendency picks the extreme influence group; the
//!   rule activated in the same context last iteration wins if it is in the
//!   group, else a uniform draw settles ties
//! - with no winner the layer's do-nothing rule is taken
//!
//! In a multi-layer set each selected rule is applied immediately so later
//! layers see its effect. The writes are logged in the rule history.
//!
//! Phase II runs once every agent has finished phase I. A collective rule
//! stays activated only while enough same-household peers activated it in
//! the same context; otherwise it is blocked, the writes of its layer and
//! every later layer of the set are undone, and phase I is re-run for those
//! layers. Blocking repeats until no quorum fails anywhere.

use std::collections::BTreeMap;

use cogent_agents::{
    Agent, AgentState, Archetype, GoalState, OverwrittenVariable, Population, RuleSet, StoredValue, variables,
};
use cogent_types::{AgentId, ContextKey, LayerKey, RuleId, Tendency};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, trace};

use super::{Target, extreme_group};
use crate::domain::DecisionContext;
use crate::error::EngineError;
use crate::history::IterationSnapshot;

const PROCESS: &str = "action selection";

// ---------------------------------------------------------------------------
// Phase I
// ---------------------------------------------------------------------------

/// Run phase I for every rule set of one agent in one context.
///
/// Each set decides for the highest-ranked goal it serves; sets serving
/// none of the agent's goals are skipped. `prior` is the agent's state from
/// the previous iteration, if any. Returns the activated rules.
pub fn select_context<C: DecisionContext>(
    population: &mut Population,
    agent: usize,
    context: &ContextKey<C>,
    state: &mut AgentState<C>,
    prior: Option<&AgentState<C>>,
    ranking: &[String],
    rng: &mut impl Rng,
) -> Result<Vec<RuleId>, EngineError> {
    let (holder, archetype) = population.pair(agent)?;
    let plan: Vec<(String, Vec<LayerKey>)> = archetype
        .rule_sets()
        .iter()
        .filter_map(|set| {
            let goal = goal_for_set(set, holder, ranking)?;
            Some((goal, set.layers.iter().map(|l| l.key).collect()))
        })
        .collect();

    let mut activated = Vec::new();
    for (goal, layers) in &plan {
        for &layer in layers {
            let target = Target {
                agent,
                context,
                goal,
                layer,
            };
            let favourite = previously_activated(prior, context, layer);
            activated.push(select_layer(population, target, state, favourite, rng)?);
        }
    }
    Ok(activated)
}

/// The rule a prior state activated in `layer` of `context`.
fn previously_activated<C: DecisionContext>(
    prior: Option<&AgentState<C>>,
    context: &ContextKey<C>,
    layer: LayerKey,
) -> Option<RuleId> {
    prior
        .and_then(|p| p.history(context))
        .and_then(|h| h.activated_in(layer))
}

/// Select, record and (for multi-layer sets) apply one layer's rule.
fn select_layer<C: DecisionContext>(
    population: &mut Population,
    target: Target<'_, C>,
    state: &mut AgentState<C>,
    favourite: Option<RuleId>,
    rng: &mut impl Rng,
) -> Result<RuleId, EngineError> {
    let (agent, archetype) = population.pair(target.agent)?;
    let layer = archetype.layer(target.layer)?;
    let blocked = state.history(target.context);

    let mut matched = Vec::new();
    for id in agent.assigned_in_layer(target.layer) {
        if blocked.is_some_and(|h| h.is_blocked(id)) {
            continue;
        }
        let Some(rule) = layer.rule(id) else {
            continue;
        };
        if rule.matches(&agent.variables, &archetype.variables)? {
            matched.push(id);
        }
    }

    let winner = match matched.as_slice() {
        [] => None,
        [only] => Some(*only),
        _ => choose(
            agent,
            archetype,
            target.goal,
            state.goal(target.goal)?,
            &matched,
            favourite,
            rng,
        )?,
    };
    let chosen = match winner.or_else(|| layer.do_nothing().map(|r| r.id)) {
        Some(id) => id,
        None => {
            return Err(EngineError::NoRuleSelected {
                agent: agent.id.clone(),
                layer: target.layer,
            });
        }
    };

    let rule = archetype.rule(chosen)?;
    let collective = rule.is_collective_action;
    let spans_layers = archetype.layer_count(target.layer.set) > 1;
    let row = agent.influence_row(chosen).cloned().unwrap_or_default();
    let archetype_name = archetype.name.clone();
    debug!(
        agent = %agent.id,
        layer = %target.layer,
        goal = target.goal,
        matched = matched.len(),
        rule = %chosen,
        "Rule selected"
    );

    if collective {
        let recruits: Vec<usize> = population
            .same_household_peers(target.agent)?
            .into_iter()
            .filter(|&peer| {
                population
                    .agent_at(peer)
                    .is_ok_and(|p| p.archetype == archetype_name && !p.holds(chosen))
            })
            .collect();
        for peer in recruits {
            let (recruit, _) = population.split_mut(peer)?;
            recruit.assign_rule(chosen, row.clone());
            trace!(agent = %recruit.id, rule = %chosen, "Collective rule shared");
        }
    }

    let mut writes = Vec::new();
    if spans_layers {
        let (agent, archetype) = population.split_mut(target.agent)?;
        let names = archetype.rule(chosen)?.written_variables();
        let before: Vec<StoredValue> = names
            .iter()
            .map(|name| StoredValue::read(&agent.variables, &archetype.variables, name))
            .collect();
        archetype.apply_rule(chosen, &mut agent.variables)?;
        for (name, before) in names.into_iter().zip(before) {
            let after = StoredValue::read(&agent.variables, &archetype.variables, &name);
            writes.push(OverwrittenVariable {
                layer: target.layer,
                name,
                before,
                after,
            });
        }
    }

    let history = state.history_mut(target.context);
    history.record_selection(target.layer, chosen, &matched);
    history.record_overwrites(target.layer, writes);
    Ok(chosen)
}

/// Pick among several matches by the goal's tendency.
fn choose(
    agent: &Agent,
    archetype: &Archetype,
    goal: &str,
    goal_state: &GoalState,
    matched: &[RuleId],
    favourite: Option<RuleId>,
    rng: &mut impl Rng,
) -> Result<Option<RuleId>, EngineError> {
    let tendency = archetype.goal(goal)?.tendency;
    let scored: Vec<(RuleId, f64)> = matched
        .iter()
        .map(|&id| (id, agent.influence(id, goal)))
        .collect();
    let group = match tendency {
        Tendency::Maximize => extreme_group(&scored, |a, b| a > b),
        Tendency::Minimize => extreme_group(&scored, |a, b| a < b),
        Tendency::AtOrAboveFocal => {
            let qualifying: Vec<(RuleId, f64)> = scored
                .iter()
                .map(|&(id, influence)| (id, goal_state.diff_current_and_focal + influence))
                .filter(|&(_, projected)| projected >= 0.0)
                .collect();
            extreme_group(&qualifying, |a, b| a < b)
        }
        Tendency::AtOrBelowFocal => {
            return Err(EngineError::UnsupportedTendency {
                process: PROCESS,
                tendency,
            });
        }
    };
    if let Some(favourite) = favourite.filter(|f| group.contains(f)) {
        trace!(agent = %agent.id, rule = %favourite, "Previously activated rule kept");
        return Ok(Some(favourite));
    }
    Ok(group.choose(rng).copied())
}

/// The highest-ranked goal of the agent a rule set serves.
fn goal_for_set(set: &RuleSet, agent: &Agent, ranking: &[String]) -> Option<String> {
    ranking
        .iter()
        .find(|goal| set.serves(goal))
        .or_else(|| set.associated_goals.iter().find(|goal| agent.has_goal(goal)))
        .cloned()
}

// ---------------------------------------------------------------------------
// Phase II
// ---------------------------------------------------------------------------

/// Block collective rules lacking a quorum and re-select their layers.
///
/// `order` lists the population indices taking part this iteration and
/// `states` their current states. `prior` is the previous iteration's
/// snapshot, consulted for tie-breaking as in phase I. Returns the number of
/// rules blocked.
pub fn enforce_quorums<C: DecisionContext>(
    population: &mut Population,
    order: &[usize],
    states: &mut BTreeMap<AgentId, AgentState<C>>,
    rankings: &BTreeMap<AgentId, Vec<String>>,
    prior: Option<&IterationSnapshot<C>>,
    rng: &mut impl Rng,
) -> Result<usize, EngineError> {
    let mut blocked = 0_usize;
    loop {
        let before = blocked;
        for &idx in order {
            let id = population.agent_at(idx)?.id.clone();
            let prior_state = prior.and_then(|p| p.state(&id));
            while let Some((context, rule)) = unmet_quorum(population, idx, &id, states)? {
                let start = rule.layer_key();
                let ranking = rankings.get(&id).map_or(&[][..], Vec::as_slice);
                let (holder, archetype) = population.pair(idx)?;
                let set = archetype.rule_set(start.set);
                let goal = set
                    .and_then(|set| goal_for_set(set, holder, ranking))
                    .ok_or_else(|| EngineError::NoRuleSelected {
                        agent: id.clone(),
                        layer: start,
                    })?;
                let layers: Vec<LayerKey> = set
                    .into_iter()
                    .flat_map(|set| set.layers.iter().map(|l| l.key))
                    .filter(|key| key.layer >= start.layer)
                    .collect();
                let Some(state) = states.get_mut(&id) else {
                    break;
                };
                let history = state.history_mut(&context);
                history.block(rule);
                let undone = history.take_overwrites_from(start);
                debug!(
                    agent = %id,
                    rule = %rule,
                    undone = undone.len(),
                    "Collective rule blocked for lack of quorum"
                );

                let (agent, archetype) = population.split_mut(idx)?;
                for write in undone.iter().rev() {
                    variables::revert(
                        &mut agent.variables,
                        &mut archetype.variables,
                        &write.name,
                        &write.before,
                        &write.after,
                    );
                }
                for layer in layers {
                    let target = Target {
                        agent: idx,
                        context: &context,
                        goal: &goal,
                        layer,
                    };
                    let favourite = previously_activated(prior_state, &context, layer);
                    select_layer(population, target, state, favourite, rng)?;
                }
                blocked = blocked.saturating_add(1);
            }
        }
        if blocked == before {
            return Ok(blocked);
        }
    }
}

/// The first activated collective rule of the agent short of its quorum.
fn unmet_quorum<C: DecisionContext>(
    population: &Population,
    idx: usize,
    id: &AgentId,
    states: &BTreeMap<AgentId, AgentState<C>>,
) -> Result<Option<(ContextKey<C>, RuleId)>, EngineError> {
    let Some(state) = states.get(id) else {
        return Ok(None);
    };
    let (agent, archetype) = population.pair(idx)?;
    let peers: Vec<&AgentId> = population
        .same_household_peers(idx)?
        .into_iter()
        .filter_map(|p| population.agent_at(p).ok())
        .filter(|p| p.archetype == agent.archetype)
        .map(|p| &p.id)
        .collect();
    for (context, history) in &state.histories {
        for &rule_id in &history.activated {
            let rule = archetype.rule(rule_id)?;
            if !rule.is_collective_action {
                continue;
            }
            let joined = peers
                .iter()
                .filter(|&&peer| {
                    states
                        .get(peer)
                        .and_then(|s| s.history(context))
                        .is_some_and(|h| h.activated.contains(&rule_id))
                })
                .count();
            let needed = usize::try_from(rule.required_participants.saturating_sub(1)).unwrap_or(usize::MAX);
            if joined < needed {
                return Ok(Some((context.clone(), rule_id)));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeSet;

    use cogent_agents::{
        AntecedentPart, ArchetypeDefinition, Consequent, Goal, RuleDefinition, RuleLayerConfig,
        RuleSetDefinition, Variables,
    };
    use cogent_types::{ComparisonOperator, Value};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    fn rule(effort: f64, participants: Option<u32>) -> RuleDefinition {
        RuleDefinition {
            set: 1,
            layer: 1,
            antecedent: vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 0.0)],
            consequent: Consequent::new("Effort", effort),
            required_participants: participants,
            is_modifiable: false,
        }
    }

    fn archetype(rules: Vec<RuleDefinition>, use_do_nothing: bool, tendency: Tendency) -> Archetype {
        Archetype::from_definition(ArchetypeDefinition {
            name: String::from("Fisher"),
            name_prefix: String::from("F"),
            variables: Variables::new(),
            goals: vec![Goal::new("Income", tendency, "Income")],
            rule_sets: vec![RuleSetDefinition {
                associated_goals: Vec::new(),
                layers: vec![RuleLayerConfig {
                    use_do_nothing,
                    ..RuleLayerConfig::default()
                }],
            }],
            rules,
            use_importance_adjusting: true,
            do_nothing_influence: BTreeMap::new(),
        })
        .unwrap()
    }

    fn agent(id: &str, archetype: &Archetype, rows: &[(u32, f64)]) -> Agent {
        let mut agent = Agent::new(AgentId::new(id), archetype);
        agent.variables.set("Stock", Value::Number(10.0));
        agent.variables.set("Household", Value::Integer(1));
        for &(number, influence) in rows {
            agent.assign_rule(
                RuleId::new(1, 1, number),
                [(String::from("Income"), influence)].into_iter().collect(),
            );
        }
        agent
    }

    fn state() -> AgentState<u8> {
        let goals = [(String::from("Income"), GoalState::new(0.0, 0.0, 1.0))].into_iter().collect();
        AgentState::new(goals, [ContextKey::Unbound])
    }

    fn ranking() -> Vec<String> {
        vec![String::from("Income")]
    }

    #[test]
    fn maximize_selects_highest_influence_for_every_seed() {
        let archetype = archetype(vec![rule(1.0, None), rule(2.0, None)], true, Tendency::Maximize);
        for seed in 0..50 {
            let mut population = Population::new();
            let fisher = agent("F1", &archetype, &[(1, 5.0), (2, 10.0)]);
            population.add_archetype(archetype.clone()).unwrap();
            population.add_agent(fisher).unwrap();
            let mut state = state();
            let mut rng = SmallRng::seed_from_u64(seed);
            let activated =
                select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng)
                    .unwrap();
            assert_eq!(activated, vec![RuleId::new(1, 1, 2)]);
            let history = state.history(&ContextKey::Unbound).unwrap();
            assert_eq!(history.matched.len(), 3);
        }
    }

    #[test]
    fn minimize_selects_lowest_influence() {
        let archetype = archetype(vec![rule(1.0, None), rule(2.0, None)], false, Tendency::Minimize);
        let mut population = Population::new();
        let fisher = agent("F1", &archetype, &[(1, 5.0), (2, 10.0)]);
        population.add_archetype(archetype).unwrap();
        population.add_agent(fisher).unwrap();
        let mut state = state();
        let mut rng = SmallRng::seed_from_u64(3);
        let activated =
            select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng).unwrap();
        assert_eq!(activated, vec![RuleId::new(1, 1, 1)]);
    }

    #[test]
    fn falls_back_to_do_nothing_when_no_rule_qualifies() {
        let archetype = archetype(vec![rule(1.0, None)], true, Tendency::AtOrAboveFocal);
        let mut population = Population::new();
        let fisher = agent("F1", &archetype, &[(1, 1.0)]);
        population.add_archetype(archetype).unwrap();
        population.add_agent(fisher).unwrap();
        let mut state = state();
        // 100 below focal: neither rule lifts the goal to its focal value.
        state.goal_mut("Income").unwrap().diff_current_and_focal = -100.0;
        let mut rng = SmallRng::seed_from_u64(3);
        let activated =
            select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng).unwrap();
        assert_eq!(activated, vec![RuleId::new(1, 1, 0)]);
    }

    #[test]
    fn missing_do_nothing_is_fatal() {
        let archetype = archetype(vec![rule(1.0, None)], false, Tendency::Maximize);
        let mut population = Population::new();
        let mut fisher = agent("F1", &archetype, &[(1, 1.0)]);
        fisher.variables.set("Stock", Value::Number(-1.0));
        population.add_archetype(archetype).unwrap();
        population.add_agent(fisher).unwrap();
        let mut state = state();
        let mut rng = SmallRng::seed_from_u64(3);
        let result =
            select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng);
        assert!(matches!(result, Err(EngineError::NoRuleSelected { .. })));
    }

    #[test]
    fn at_or_below_focal_is_unsupported() {
        let archetype = archetype(vec![rule(1.0, None)], true, Tendency::AtOrBelowFocal);
        let mut population = Population::new();
        let fisher = agent("F1", &archetype, &[(1, 1.0)]);
        population.add_archetype(archetype).unwrap();
        population.add_agent(fisher).unwrap();
        let mut state = state();
        let mut rng = SmallRng::seed_from_u64(3);
        let result =
            select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng);
        assert!(matches!(result, Err(EngineError::UnsupportedTendency { .. })));
    }

    /// Three fishers, the first holding a 3-participant rule.
    fn crew(links: &[(&str, &str)]) -> Population {
        let archetype = archetype(vec![rule(1.0, Some(3))], true, Tendency::Maximize);
        let mut population = Population::new();
        let fishers = [
            agent("F1", &archetype, &[(1, 5.0)]),
            agent("F2", &archetype, &[]),
            agent("F3", &archetype, &[]),
        ];
        population.add_archetype(archetype).unwrap();
        for fisher in fishers {
            population.add_agent(fisher).unwrap();
        }
        for (a, b) in links {
            population.connect(&AgentId::new(*a), &AgentId::new(*b)).unwrap();
        }
        population
    }

    fn run_both_phases(population: &mut Population) -> (BTreeMap<AgentId, AgentState<u8>>, usize) {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut states = BTreeMap::new();
        let mut rankings = BTreeMap::new();
        for idx in 0..population.len() {
            let id = population.agent_at(idx).unwrap().id.clone();
            let mut state = state();
            select_context(population, idx, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng).unwrap();
            states.insert(id.clone(), state);
            rankings.insert(id, ranking());
        }
        let order: Vec<usize> = (0..population.len()).collect();
        let blocked = enforce_quorums(population, &order, &mut states, &rankings, None, &mut rng).unwrap();
        (states, blocked)
    }

    #[test]
    fn collective_rule_spreads_to_household_peers() {
        let mut population = crew(&[("F1", "F2"), ("F1", "F3"), ("F2", "F3")]);
        let (states, blocked) = run_both_phases(&mut population);
        assert_eq!(blocked, 0);
        let rule = RuleId::new(1, 1, 1);
        for state in states.values() {
            let history = state.history(&ContextKey::Unbound).unwrap();
            assert_eq!(history.activated, vec![rule]);
        }
        assert_eq!(
            population.agent(&AgentId::new("F3")).unwrap().influence(rule, "Income"),
            5.0
        );
    }

    #[test]
    fn collective_rule_without_quorum_is_blocked() {
        let mut population = crew(&[("F1", "F2")]);
        let (states, blocked) = run_both_phases(&mut population);
        assert_eq!(blocked, 2);
        let rule = RuleId::new(1, 1, 1);
        for name in ["F1", "F2"] {
            let history = states[&AgentId::new(name)].history(&ContextKey::Unbound).unwrap();
            assert!(history.is_blocked(rule));
            assert_eq!(history.activated, vec![RuleId::new(1, 1, 0)]);
            assert!(!history.matched.contains(&rule));
        }
    }

    #[test]
    fn other_households_do_not_count_toward_quorum() {
        let mut population = crew(&[("F1", "F2"), ("F1", "F3"), ("F2", "F3")]);
        population
            .agent_mut(&AgentId::new("F3"))
            .unwrap()
            .variables
            .set("Household", Value::Integer(2));
        let (states, blocked) = run_both_phases(&mut population);
        assert_eq!(blocked, 2);
        let history = states[&AgentId::new("F1")].history(&ContextKey::Unbound).unwrap();
        assert!(history.is_blocked(RuleId::new(1, 1, 1)));
    }

    #[test]
    fn previously_activated_rule_wins_a_tie() {
        let archetype = archetype(vec![rule(1.0, None), rule(2.0, None)], true, Tendency::Maximize);
        let favourite = RuleId::new(1, 1, 2);
        let mut prior = state();
        prior
            .history_mut(&ContextKey::Unbound)
            .record_selection(favourite.layer_key(), favourite, &[favourite]);

        let mut drawn = BTreeSet::new();
        for seed in 0..50 {
            for remembered in [Some(&prior), None] {
                let mut population = Population::new();
                let fisher = agent("F1", &archetype, &[(1, 5.0), (2, 5.0)]);
                population.add_archetype(archetype.clone()).unwrap();
                population.add_agent(fisher).unwrap();
                let mut state = state();
                let mut rng = SmallRng::seed_from_u64(seed);
                let activated = select_context(
                    &mut population,
                    0,
                    &ContextKey::Unbound,
                    &mut state,
                    remembered,
                    &ranking(),
                    &mut rng,
                )
                .unwrap();
                match remembered {
                    Some(_) => assert_eq!(activated, vec![favourite]),
                    None => {
                        drawn.extend(activated);
                    }
                }
            }
        }
        // Without a memory the tie is a coin flip.
        assert_eq!(drawn.len(), 2);
    }

    #[test]
    fn at_or_above_focal_takes_the_smallest_sufficient_rule() {
        let rules = vec![rule(1.0, None), rule(2.0, None), rule(3.0, None), rule(4.0, None)];
        let archetype = archetype(rules, true, Tendency::AtOrAboveFocal);
        for seed in 0..20 {
            let mut population = Population::new();
            let fisher = agent("F1", &archetype, &[(1, 2.0), (2, 4.0), (3, 6.0), (4, 10.0)]);
            population.add_archetype(archetype.clone()).unwrap();
            population.add_agent(fisher).unwrap();
            let mut state = state();
            // 3 short of focal: rule 1 falls short, rule 2 clears it by the least.
            state.goal_mut("Income").unwrap().diff_current_and_focal = -3.0;
            let mut rng = SmallRng::seed_from_u64(seed);
            let activated =
                select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng)
                    .unwrap();
            assert_eq!(activated, vec![RuleId::new(1, 1, 2)]);
        }
    }

    /// One fisher with a two-layer set: layer 1 sets `Gear`, layer 2 only
    /// fires once `Gear` is above 1.
    fn geared(participants: Option<u32>) -> Population {
        let gear = RuleDefinition {
            set: 1,
            layer: 1,
            antecedent: vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 0.0)],
            consequent: Consequent::new("Gear", 2.0),
            required_participants: participants,
            is_modifiable: false,
        };
        let effort = RuleDefinition {
            set: 1,
            layer: 2,
            antecedent: vec![AntecedentPart::new("Gear", ComparisonOperator::Greater, 1.0)],
            consequent: Consequent::new("Effort", 5.0),
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
            rules: vec![gear, effort],
            use_importance_adjusting: true,
            do_nothing_influence: BTreeMap::new(),
        })
        .unwrap();
        let mut fisher = agent("F1", &archetype, &[(1, 5.0)]);
        fisher.variables.set("Gear", Value::Number(0.0));
        fisher.variables.set("Effort", Value::Number(0.0));
        fisher.assign_rule(
            RuleId::new(1, 2, 1),
            [(String::from("Income"), 5.0)].into_iter().collect(),
        );
        let mut population = Population::new();
        population.add_archetype(archetype).unwrap();
        population.add_agent(fisher).unwrap();
        population
    }

    #[test]
    fn earlier_layer_is_applied_before_the_next_is_selected() {
        let mut population = geared(None);
        let mut state = state();
        let mut rng = SmallRng::seed_from_u64(5);
        let activated =
            select_context(&mut population, 0, &ContextKey::Unbound, &mut state, None, &ranking(), &mut rng).unwrap();
        assert_eq!(activated, vec![RuleId::new(1, 1, 1), RuleId::new(1, 2, 1)]);
        let fisher = population.agent(&AgentId::new("F1")).unwrap();
        assert_eq!(fisher.variables.get("Gear"), Some(&Value::Number(2.0)));
        let history = state.history(&ContextKey::Unbound).unwrap();
        assert_eq!(history.overwritten.len(), 2);
    }

    #[test]
    fn blocked_rule_writes_are_undone_before_later_layers_reselect() {
        let mut population = geared(Some(2));
        let (states, blocked) = run_both_phases(&mut population);
        assert_eq!(blocked, 1);

        let history = states[&AgentId::new("F1")].history(&ContextKey::Unbound).unwrap();
        assert!(history.is_blocked(RuleId::new(1, 1, 1)));
        // Without the gear the effort rule no longer matches.
        assert_eq!(history.activated, vec![RuleId::new(1, 1, 0), RuleId::new(1, 2, 0)]);
        assert!(history.overwritten.is_empty());
        let fisher = population.agent(&AgentId::new("F1")).unwrap();
        assert_eq!(fisher.variables.get("Gear"), Some(&Value::Number(0.0)));
        assert_eq!(fisher.variables.get("Effort"), Some(&Value::Number(0.0)));
    }
}
