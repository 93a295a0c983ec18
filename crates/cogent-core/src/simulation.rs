//! The iteration loop: sequences the cognitive processes over a population.
//!
//! Each iteration runs these steps in order:
//!
//! 1. **Pre-iteration hook** -- the domain refreshes variables.
//! 2. **Ordering** -- active agents grouped by archetype (name order),
//!    optionally shuffled within each group.
//! 3. **States** -- the previous state carried forward, or the domain's
//!    initial state for agents seen for the first time.
//! 4. **Learning** -- anticipatory learning, then counterfactual thinking
//!    and innovation for goals lacking confidence.
//! 5. **Social learning** -- copy rules neighbours activated.
//! 6. **Selection** -- phase I for every agent, then phase II quorums.
//! 7. **Action taking** -- apply activated rules.
//! 8. **Wrap-up** -- post-iteration hook, snapshot, stoppage check,
//!    deactivation and reproduction hooks, maintenance.
//!
//! The loop is deterministic for a given seed: every random draw comes from
//! the simulation's own RNG.

use std::collections::{BTreeMap, BTreeSet};

use cogent_agents::{AgentState, Population, RuleInsertion};
use cogent_types::{AgentId, ArchetypeRule, ContextKey, LayerKey};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::Domain;
use crate::error::EngineError;
use crate::history::{History, IterationSnapshot};
use crate::maintenance;
use crate::processes::{Target, anticipatory, counterfactual, innovation, selection, social, taking};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every configured iteration ran.
    Completed,
    /// Every activated rule was a do-nothing rule.
    StoppageCondition,
    /// No agent was active at the start of an iteration.
    NoActiveAgents,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Iterations executed.
    pub iterations_completed: u64,
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// Rules innovation added to rule bases.
    pub rules_generated: usize,
    /// Rules maintenance removed.
    pub rules_removed: usize,
}

/// What happened in one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport<C> {
    /// 1-based iteration number.
    pub iteration: u64,
    /// Agents that took part.
    pub active_agents: usize,
    /// Rules innovation added this iteration.
    pub new_rules: Vec<ArchetypeRule>,
    /// Rules maintenance removed at the end of the iteration.
    pub removed_rules: Vec<ArchetypeRule>,
    /// Rules activated in each context, across all agents.
    pub activated: BTreeMap<ContextKey<C>, BTreeSet<ArchetypeRule>>,
    /// Whether the stoppage condition held.
    pub stop_requested: bool,
}

/// One agent's slot in the iteration order.
struct Turn<C> {
    idx: usize,
    id: AgentId,
    contexts: Vec<ContextKey<C>>,
}

/// A population driven by the cognitive processes.
pub struct Simulation<D: Domain, R = StdRng> {
    config: EngineConfig,
    domain: D,
    population: Population,
    history: History<D::Context>,
    rng: R,
    iteration: u64,
    rules_generated: usize,
    rules_removed: usize,
}

impl<D: Domain> Simulation<D, StdRng> {
    /// Create a simulation seeded from `config.run.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyArchetypes`] if the population has no
    /// archetypes, or [`EngineError::InvalidConfig`] if validation fails.
    pub fn new(config: EngineConfig, domain: D, population: Population) -> Result<Self, EngineError> {
        let rng = StdRng::seed_from_u64(config.run.seed);
        Self::with_rng(config, domain, population, rng)
    }
}

impl<D: Domain, R: Rng> Simulation<D, R> {
    /// Create a simulation drawing from a caller-supplied RNG.
    pub fn with_rng(config: EngineConfig, domain: D, population: Population, rng: R) -> Result<Self, EngineError> {
        config.validate()?;
        if !population.has_archetypes() {
            return Err(EngineError::EmptyArchetypes);
        }
        let history = History::new(config.run.effective_history_depth());
        Ok(Self {
            config,
            domain,
            population,
            history,
            rng,
            iteration: 0,
            rules_generated: 0,
            rules_removed: 0,
        })
    }

    /// Completed iterations.
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Retained snapshots of completed iterations.
    pub const fn history(&self) -> &History<D::Context> {
        &self.history
    }

    /// The population.
    pub const fn population(&self) -> &Population {
        &self.population
    }

    /// The population, mutably, for domain updates between iterations.
    pub const fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// The domain.
    pub const fn domain(&self) -> &D {
        &self.domain
    }

    /// The domain, mutably.
    pub const fn domain_mut(&mut self) -> &mut D {
        &mut self.domain
    }

    /// Run until the configured iteration count, the stoppage condition,
    /// or an empty population.
    pub fn run(&mut self) -> Result<RunSummary, EngineError> {
        info!(
            iterations = self.config.run.iterations,
            seed = self.config.run.seed,
            agents = self.population.len(),
            "Simulation starting"
        );
        let stop_reason = loop {
            if self.iteration >= self.config.run.iterations {
                break StopReason::Completed;
            }
            if !self.population.agents().iter().any(|a| a.active) {
                info!(iteration = self.iteration, "No active agents left");
                break StopReason::NoActiveAgents;
            }
            let report = self.step()?;
            if report.stop_requested {
                info!(iteration = report.iteration, "Stoppage condition met");
                break StopReason::StoppageCondition;
            }
        };
        let summary = RunSummary {
            iterations_completed: self.iteration,
            stop_reason,
            rules_generated: self.rules_generated,
            rules_removed: self.rules_removed,
        };
        info!(
            reason = ?summary.stop_reason,
            iterations = summary.iterations_completed,
            rules_generated = summary.rules_generated,
            rules_removed = summary.rules_removed,
            "Simulation ended"
        );
        Ok(summary)
    }

    /// Execute one iteration.
    #[allow(clippy::too_many_lines)]
    pub fn step(&mut self) -> Result<IterationReport<D::Context>, EngineError> {
        let iteration = self.iteration.saturating_add(1);

        // --- Pre-iteration hook ---
        self.domain.pre_iteration(iteration, &mut self.population)?;

        // --- Ordering and states ---
        let turns = self.order_agents(iteration)?;
        let mut states = self.open_states(&turns)?;
        info!(iteration, agents = turns.len(), "Iteration started");

        // --- Learning ---
        let mut new_rules = Vec::new();
        let mut rankings = BTreeMap::new();
        for turn in &turns {
            let Some(state) = states.get_mut(&turn.id) else {
                continue;
            };
            let ranking = self.learn(turn, state, &mut new_rules)?;
            rankings.insert(turn.id.clone(), ranking);
        }

        // --- Social learning ---
        let observed = self
            .history
            .latest()
            .filter(|_| self.config.processes.social_learning);
        if let Some(prior) = observed {
            for turn in &turns {
                social::learn(&mut self.population, turn.idx, prior, &mut self.rng)?;
            }
        }

        // --- Action selection ---
        if self.config.processes.action_selection_part_i {
            for turn in &turns {
                let Some(state) = states.get_mut(&turn.id) else {
                    continue;
                };
                let ranking = rankings.get(&turn.id).map_or(&[][..], Vec::as_slice);
                let prior = self.history.latest().and_then(|s| s.state(&turn.id));
                for context in &turn.contexts {
                    let (agent, archetype) = self.population.split_mut(turn.idx)?;
                    self.domain.before_action_selection(agent, archetype, context)?;
                    selection::select_context(
                        &mut self.population,
                        turn.idx,
                        context,
                        state,
                        prior,
                        ranking,
                        &mut self.rng,
                    )?;
                }
            }
            if self.config.processes.action_selection_part_ii {
                let order: Vec<usize> = turns.iter().map(|t| t.idx).collect();
                let blocked = selection::enforce_quorums(
                    &mut self.population,
                    &order,
                    &mut states,
                    &rankings,
                    self.history.latest(),
                    &mut self.rng,
                )?;
                if blocked > 0 {
                    debug!(iteration, blocked, "Collective rules blocked");
                }
            }
        }

        for turn in &turns {
            let Some(state) = states.get(&turn.id) else {
                continue;
            };
            let (agent, _) = self.population.split_mut(turn.idx)?;
            for rule in state.activated_rules() {
                agent.mark_activated(rule);
            }
        }

        // --- Action taking ---
        if self.config.processes.action_taking {
            for turn in &turns {
                let Some(state) = states.get_mut(&turn.id) else {
                    continue;
                };
                for context in &turn.contexts {
                    let taken = taking::take(&mut self.population, turn.idx, context, state)?;
                    let (agent, archetype) = self.population.split_mut(turn.idx)?;
                    self.domain.after_action_taking(agent, archetype, context, &taken)?;
                }
            }
        }

        // --- Wrap-up ---
        self.domain.post_iteration(iteration, &mut self.population)?;

        let activated = collect_activations(&self.population, &states)?;
        let stop_requested = self.config.processes.algorithm_stop && self.only_do_nothing(&activated);
        self.history.push(IterationSnapshot { iteration, states });

        self.domain.deactivate(iteration, &mut self.population)?;
        self.domain.reproduce(iteration, &mut self.population)?;
        let removed_rules = maintenance::run(&mut self.population);

        self.iteration = iteration;
        self.rules_generated = self.rules_generated.saturating_add(new_rules.len());
        self.rules_removed = self.rules_removed.saturating_add(removed_rules.len());
        info!(
            iteration,
            new_rules = new_rules.len(),
            removed_rules = removed_rules.len(),
            "Iteration completed"
        );

        Ok(IterationReport {
            iteration,
            active_agents: turns.len(),
            new_rules,
            removed_rules,
            activated,
            stop_requested,
        })
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// Active agents grouped by archetype name, shuffled within each group
    /// when agent randomization is on.
    fn order_agents(&mut self, iteration: u64) -> Result<Vec<Turn<D::Context>>, EngineError> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, agent) in self.population.agents().iter().enumerate() {
            if agent.active {
                groups.entry(agent.archetype.as_str()).or_default().push(idx);
            }
        }
        let mut order = Vec::new();
        for mut group in groups.into_values() {
            if self.config.processes.agent_randomization {
                group.shuffle(&mut self.rng);
            }
            order.extend(group);
        }

        let mut turns = Vec::with_capacity(order.len());
        for idx in order {
            let agent = self.population.agent_at(idx)?;
            let sites = self.domain.contexts(agent, iteration);
            let contexts = if sites.is_empty() {
                vec![ContextKey::Unbound]
            } else {
                sites.into_iter().map(ContextKey::Site).collect()
            };
            turns.push(Turn {
                idx,
                id: agent.id.clone(),
                contexts,
            });
        }
        Ok(turns)
    }

    /// This iteration's state for every agent taking part.
    fn open_states(
        &mut self,
        turns: &[Turn<D::Context>],
    ) -> Result<BTreeMap<AgentId, AgentState<D::Context>>, EngineError> {
        let mut states = BTreeMap::new();
        for turn in turns {
            let carried = self.history.latest().and_then(|s| s.state(&turn.id));
            let state = match carried {
                Some(prior) => {
                    let mut next = prior.next_iteration();
                    for context in &turn.contexts {
                        next.history_mut(context);
                    }
                    next
                }
                None => {
                    let (agent, archetype) = self.population.pair(turn.idx)?;
                    self.domain.initial_state(agent, archetype, &turn.contexts)?
                }
            };
            states.insert(turn.id.clone(), state);
        }
        Ok(states)
    }

    /// Anticipatory learning, counterfactual thinking and innovation for
    /// one agent. Returns the agent's goal ranking.
    fn learn(
        &mut self,
        turn: &Turn<D::Context>,
        state: &mut AgentState<D::Context>,
        new_rules: &mut Vec<ArchetypeRule>,
    ) -> Result<Vec<String>, EngineError> {
        let prior = self.history.latest().and_then(|s| s.state(&turn.id));
        let Some(prior) = prior.filter(|_| self.config.processes.anticipatory_learning) else {
            let (agent, archetype) = self.population.pair(turn.idx)?;
            return Ok(anticipatory::static_ranking(agent, archetype, state));
        };
        let twice_prior = self.history.before_latest().and_then(|s| s.state(&turn.id));

        let (agent, archetype) = self.population.split_mut(turn.idx)?;
        let ranking = anticipatory::learn(agent, archetype, state, prior, twice_prior, &mut self.rng)?;

        let processes = self.config.processes;
        let unconfident: Vec<String> = ranking
            .iter()
            .filter(|goal| state.goal(goal).is_ok_and(|g| !g.confidence))
            .cloned()
            .collect();
        for goal in &unconfident {
            let layers = self.modifiable_layers(turn.idx, goal)?;
            for context in &turn.contexts {
                let (agent, archetype) = self.population.split_mut(turn.idx)?;
                self.domain.before_counterfactual_thinking(agent, archetype, context)?;

                for &layer in &layers {
                    if state.goal(goal)?.confidence {
                        break;
                    }
                    let past = prior.history(context);
                    let matched = past.map(|h| h.matched_in(layer)).unwrap_or_default();
                    let activated = past.and_then(|h| h.activated_in(layer));
                    if processes.counterfactual_thinking && matched.len() >= 2 {
                        let (agent, archetype) = self.population.pair(turn.idx)?;
                        if counterfactual::think(agent, archetype, goal, state.goal(goal)?, &matched, activated)? {
                            state.goal_mut(goal)?.confidence = true;
                            continue;
                        }
                    }
                    if !processes.innovation {
                        continue;
                    }
                    let goal_state = state.goal(goal)?.clone();
                    let target = Target {
                        agent: turn.idx,
                        context,
                        goal,
                        layer,
                    };
                    let outcome = innovation::innovate(
                        &mut self.population,
                        target,
                        &goal_state,
                        &self.history,
                        &self.config.innovation,
                        &mut self.rng,
                    )?;
                    let (agent, archetype) = self.population.split_mut(turn.idx)?;
                    if let Some(RuleInsertion::Added { id, .. }) = outcome {
                        new_rules.push(ArchetypeRule::new(archetype.name.clone(), id));
                    }
                    self.domain
                        .after_innovation(agent, archetype, context, outcome.and_then(RuleInsertion::rule_id))?;
                }
            }
        }
        Ok(ranking)
    }

    /// Layers serving `goal` that innovation may extend.
    fn modifiable_layers(&self, idx: usize, goal: &str) -> Result<Vec<LayerKey>, EngineError> {
        let (_, archetype) = self.population.pair(idx)?;
        Ok(archetype
            .rule_sets()
            .iter()
            .filter(|set| set.serves(goal))
            .flat_map(|set| set.layers.iter())
            .filter(|layer| layer.config.modifiable || layer.rules().iter().any(|r| r.is_modifiable))
            .map(|layer| layer.key)
            .collect())
    }

    /// Whether some rule was activated and every activated rule is a
    /// do-nothing rule.
    fn only_do_nothing(&self, activated: &BTreeMap<ContextKey<D::Context>, BTreeSet<ArchetypeRule>>) -> bool {
        let mut rules = activated.values().flatten().peekable();
        rules.peek().is_some()
            && rules.all(|owned| {
                !self
                    .population
                    .archetype(&owned.archetype)
                    .and_then(|archetype| archetype.rule(owned.rule))
                    .is_ok_and(|rule| rule.is_action)
            })
    }
}

/// Rules activated per context, across all agents, qualified by the
/// activating agent's archetype.
fn collect_activations<C: Ord + Clone>(
    population: &Population,
    states: &BTreeMap<AgentId, AgentState<C>>,
) -> Result<BTreeMap<ContextKey<C>, BTreeSet<ArchetypeRule>>, EngineError> {
    let mut activated: BTreeMap<ContextKey<C>, BTreeSet<ArchetypeRule>> = BTreeMap::new();
    for (id, state) in states {
        let archetype = &population.agent(id)?.archetype;
        for (context, history) in &state.histories {
            activated.entry(context.clone()).or_default().extend(
                history
                    .activated
                    .iter()
                    .map(|&rule| ArchetypeRule::new(archetype.clone(), rule)),
            );
        }
    }
    Ok(activated)
}
