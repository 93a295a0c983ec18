//! The population: archetypes plus the agents instantiated from them.
//!
//! Archetypes own the rule base, agents hold ids into it, so any operation
//! touching both goes through [`Population`]. Cross-agent work (eviction,
//! pruning, household lookups) collects indices first and mutates second.

use std::collections::BTreeMap;

use cogent_types::{AgentId, ArchetypeRule, LayerKey, RuleId};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, warn};

use crate::agent::Agent;
use crate::archetype::Archetype;
use crate::error::AgentError;
use crate::rule::Rule;

/// Outcome of offering a rule to an archetype's rule base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleInsertion {
    /// The rule was added, possibly after evicting another.
    Added {
        /// Id the layer assigned to the new rule.
        id: RuleId,
        /// The rule evicted to make room, if any.
        evicted: Option<RuleId>,
    },
    /// A structurally identical rule already exists.
    Existing(RuleId),
    /// The layer is full of rules that cannot be evicted.
    Refused,
}

impl RuleInsertion {
    /// The id an agent should be assigned, if any.
    pub const fn rule_id(self) -> Option<RuleId> {
        match self {
            Self::Added { id, .. } | Self::Existing(id) => Some(id),
            Self::Refused => None,
        }
    }
}

/// Archetypes and agents of a simulation.
#[derive(Debug, Clone, Default)]
pub struct Population {
    archetypes: BTreeMap<String, Archetype>,
    agents: Vec<Agent>,
    index: BTreeMap<AgentId, usize>,
}

impl Population {
    /// An empty population.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register an archetype.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::InvalidDefinition`] if the name is taken.
    pub fn add_archetype(&mut self, archetype: Archetype) -> Result<(), AgentError> {
        if self.archetypes.contains_key(&archetype.name) {
            return Err(AgentError::InvalidDefinition {
                reason: format!("archetype {} is defined twice", archetype.name),
            });
        }
        self.archetypes.insert(archetype.name.clone(), archetype);
        Ok(())
    }

    /// Register an agent, returning its index.
    pub fn add_agent(&mut self, agent: Agent) -> Result<usize, AgentError> {
        if !self.archetypes.contains_key(&agent.archetype) {
            return Err(AgentError::UnknownArchetype(agent.archetype));
        }
        if self.index.contains_key(&agent.id) {
            return Err(AgentError::DuplicateAgent(agent.id));
        }
        let idx = self.agents.len();
        self.index.insert(agent.id.clone(), idx);
        self.agents.push(agent);
        Ok(idx)
    }

    /// Instantiate a fresh agent of an archetype, named from its prefix.
    pub fn spawn(&mut self, archetype: &str) -> Result<AgentId, AgentError> {
        let template = self.archetype(archetype)?;
        let mut ordinal = self
            .agents
            .iter()
            .filter(|a| a.archetype == archetype)
            .count()
            .saturating_add(1);
        let mut id = AgentId::new(format!("{}{ordinal}", template.name_prefix));
        while self.index.contains_key(&id) {
            ordinal = ordinal.saturating_add(1);
            id = AgentId::new(format!("{}{ordinal}", template.name_prefix));
        }
        let agent = Agent::new(id.clone(), template);
        self.add_agent(agent)?;
        debug!(agent = %id, archetype, "Agent spawned");
        Ok(id)
    }

    /// Connect two agents both ways.
    pub fn connect(&mut self, a: &AgentId, b: &AgentId) -> Result<(), AgentError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if let Some(agent) = self.agents.get_mut(ia) {
            agent.connect(b.clone());
        }
        if let Some(agent) = self.agents.get_mut(ib) {
            agent.connect(a.clone());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Archetypes in name order.
    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.values()
    }

    /// Whether no archetype is registered.
    pub fn has_archetypes(&self) -> bool {
        !self.archetypes.is_empty()
    }

    /// Look up an archetype.
    pub fn archetype(&self, name: &str) -> Result<&Archetype, AgentError> {
        self.archetypes
            .get(name)
            .ok_or_else(|| AgentError::UnknownArchetype(String::from(name)))
    }

    /// Look up an archetype mutably.
    pub fn archetype_mut(&mut self, name: &str) -> Result<&mut Archetype, AgentError> {
        self.archetypes
            .get_mut(name)
            .ok_or_else(|| AgentError::UnknownArchetype(String::from(name)))
    }

    /// Agents in registration order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Index of an agent.
    pub fn index_of(&self, id: &AgentId) -> Result<usize, AgentError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))
    }

    /// Look up an agent by id.
    pub fn agent(&self, id: &AgentId) -> Result<&Agent, AgentError> {
        let idx = self.index_of(id)?;
        self.agent_at(idx)
    }

    /// Look up an agent by id, mutably.
    pub fn agent_mut(&mut self, id: &AgentId) -> Result<&mut Agent, AgentError> {
        let idx = self.index_of(id)?;
        self.agents
            .get_mut(idx)
            .ok_or_else(|| AgentError::UnknownAgent(id.clone()))
    }

    /// Look up an agent by index.
    pub fn agent_at(&self, idx: usize) -> Result<&Agent, AgentError> {
        self.agents
            .get(idx)
            .ok_or_else(|| AgentError::UnknownAgent(AgentId::new(format!("#{idx}"))))
    }

    /// An agent together with its archetype.
    pub fn pair(&self, idx: usize) -> Result<(&Agent, &Archetype), AgentError> {
        let agent = self.agent_at(idx)?;
        let archetype = self.archetype(&agent.archetype)?;
        Ok((agent, archetype))
    }

    /// An agent and its archetype, both mutable.
    pub fn split_mut(&mut self, idx: usize) -> Result<(&mut Agent, &mut Archetype), AgentError> {
        let Self {
            archetypes, agents, ..
        } = self;
        let agent = agents
            .get_mut(idx)
            .ok_or_else(|| AgentError::UnknownAgent(AgentId::new(format!("#{idx}"))))?;
        let archetype = archetypes
            .get_mut(&agent.archetype)
            .ok_or_else(|| AgentError::UnknownArchetype(agent.archetype.clone()))?;
        Ok((agent, archetype))
    }

    /// Indices of the agents of an archetype holding a rule.
    pub fn holders(&self, archetype: &str, rule: RuleId) -> Vec<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.archetype == archetype && a.holds(rule))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Connected agents sharing the agent's household.
    ///
    /// Peers match when their `Household` values are equal; two agents that
    /// both lack the variable also match.
    pub fn same_household_peers(&self, idx: usize) -> Result<Vec<usize>, AgentError> {
        let (agent, archetype) = self.pair(idx)?;
        let household = agent.household(&archetype.variables);
        let mut peers = Vec::new();
        for peer_id in &agent.connections {
            let Some(&peer_idx) = self.index.get(peer_id) else {
                continue;
            };
            let (peer, peer_archetype) = self.pair(peer_idx)?;
            if peer.household(&peer_archetype.variables) == household {
                peers.push(peer_idx);
            }
        }
        Ok(peers)
    }

    // -----------------------------------------------------------------------
    // Rule base mutation
    // -----------------------------------------------------------------------

    /// Offer a rule to an archetype's rule base.
    ///
    /// A structurally identical member is reused. A full layer first evicts a
    /// rule no agent holds, then the action rule every holder has gone the
    /// longest without activating (ties broken at random). The evicted rule
    /// is unassigned from all holders.
    pub fn insert_rule(
        &mut self,
        archetype: &str,
        rule: Rule,
        rng: &mut impl Rng,
    ) -> Result<RuleInsertion, AgentError> {
        let key = rule.id.layer_key();
        let layer = self.archetype(archetype)?.layer(key)?;
        if let Some(existing) = layer.find_similar(&rule) {
            return Ok(RuleInsertion::Existing(existing));
        }

        let mut evicted = None;
        if layer.is_full() {
            let Some(victim) = self.eviction_candidate(archetype, key, rng)? else {
                warn!(archetype, layer = %key, "Layer full and nothing evictable, rule dropped");
                return Ok(RuleInsertion::Refused);
            };
            self.evict(archetype, victim)?;
            evicted = Some(victim);
        }

        let id = self.archetype_mut(archetype)?.layer_mut(key)?.push(rule);
        debug!(archetype, rule = %id, evicted = ?evicted, "Rule added to rule base");
        Ok(RuleInsertion::Added { id, evicted })
    }

    fn eviction_candidate(
        &self,
        archetype: &str,
        key: LayerKey,
        rng: &mut impl Rng,
    ) -> Result<Option<RuleId>, AgentError> {
        let layer = self.archetype(archetype)?.layer(key)?;
        let actions: Vec<RuleId> = layer
            .rules()
            .iter()
            .filter(|r| r.is_action)
            .map(|r| r.id)
            .collect();

        let mut stalest: Vec<RuleId> = Vec::new();
        let mut stalest_freshness = 0_u32;
        for id in actions {
            let holders = self.holders(archetype, id);
            if holders.is_empty() {
                return Ok(Some(id));
            }
            let freshness = holders
                .iter()
                .filter_map(|&idx| self.agents.get(idx).and_then(|a| a.freshness(id)))
                .min()
                .unwrap_or(0);
            if stalest.is_empty() || freshness > stalest_freshness {
                stalest.clear();
                stalest.push(id);
                stalest_freshness = freshness;
            } else if freshness == stalest_freshness {
                stalest.push(id);
            }
        }
        Ok(stalest.choose(rng).copied())
    }

    fn evict(&mut self, archetype: &str, rule: RuleId) -> Result<(), AgentError> {
        for agent in self.agents.iter_mut().filter(|a| a.archetype == archetype) {
            agent.unassign_rule(rule);
        }
        self.archetype_mut(archetype)?.remove_rule(rule);
        debug!(archetype, rule = %rule, "Rule evicted");
        Ok(())
    }

    /// Remove every action rule no agent of its archetype holds.
    pub fn prune_unassigned(&mut self) -> Vec<ArchetypeRule> {
        let mut removed = Vec::new();
        for (name, archetype) in &mut self.archetypes {
            let orphans: Vec<RuleId> = archetype
                .rules()
                .filter(|r| r.is_action)
                .map(|r| r.id)
                .filter(|&id| {
                    !self
                        .agents
                        .iter()
                        .any(|a| &a.archetype == name && a.holds(id))
                })
                .collect();
            for id in orphans {
                archetype.remove_rule(id);
                removed.push(ArchetypeRule::new(name.clone(), id));
            }
        }
        removed
    }

    /// Age the rules of every active agent by one iteration.
    pub fn age_rules(&mut self) {
        for agent in self.agents.iter_mut().filter(|a| a.active) {
            agent.age_rules();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use cogent_types::{ComparisonOperator, Value};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::archetype::ArchetypeDefinition;
    use crate::fixtures;
    use crate::rule::{AntecedentPart, Consequent};

    fn population(agents: usize) -> Population {
        let archetype = fixtures::fisher();
        let mut population = Population::new();
        for n in 1..=agents {
            let agent = fixtures::fisher_agent(&format!("F{n}"), &archetype);
            population.archetypes.entry(archetype.name.clone()).or_insert_with(|| archetype.clone());
            population.add_agent(agent).unwrap();
        }
        population
    }

    fn candidate(effort: f64) -> Rule {
        let template = Rule::do_nothing(RuleId::new(1, 1, 0));
        Rule {
            is_action: true,
            ..template.renew(
                vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 5.0)],
                Consequent::new("Effort", effort),
            )
        }
    }

    #[test]
    fn rejects_duplicate_agents_and_unknown_archetypes() {
        let mut population = population(1);
        let archetype = fixtures::fisher();
        let dup = fixtures::fisher_agent("F1", &archetype);
        assert!(matches!(population.add_agent(dup), Err(AgentError::DuplicateAgent(_))));
        let mut stray = fixtures::fisher_agent("X1", &archetype);
        stray.archetype = String::from("Farmer");
        assert!(matches!(population.add_agent(stray), Err(AgentError::UnknownArchetype(_))));
    }

    #[test]
    fn similar_rule_is_reused() {
        let mut population = population(1);
        let mut rng = SmallRng::seed_from_u64(1);
        let existing = population.archetype("Fisher").unwrap().rule(RuleId::new(1, 1, 1)).unwrap().clone();
        let outcome = population.insert_rule("Fisher", existing, &mut rng).unwrap();
        assert_eq!(outcome, RuleInsertion::Existing(RuleId::new(1, 1, 1)));
    }

    #[test]
    fn full_layer_evicts_stalest_rule() {
        let mut population = population(2);
        let mut rng = SmallRng::seed_from_u64(7);
        // Capacity 4: do-nothing, two configured rules, one free slot.
        let added = population.insert_rule("Fisher", candidate(3.0), &mut rng).unwrap();
        let third = added.rule_id().unwrap();
        for idx in 0..2 {
            population.agents[idx].assign_rule(third, BTreeMap::new());
        }
        population.age_rules();
        population.age_rules();
        for idx in 0..2 {
            population.agents[idx].mark_activated(third);
        }
        // Rule 2 is fresh for one holder only; the freshest holder counts.
        population.agents[0].mark_activated(RuleId::new(1, 1, 2));

        let outcome = population.insert_rule("Fisher", candidate(4.0), &mut rng).unwrap();
        assert_eq!(
            outcome,
            RuleInsertion::Added {
                id: RuleId::new(1, 1, 4),
                evicted: Some(RuleId::new(1, 1, 1)),
            }
        );
        assert!(population.agents.iter().all(|a| !a.holds(RuleId::new(1, 1, 1))));
        let layer = population.archetype("Fisher").unwrap().layer(LayerKey::new(1, 1)).unwrap();
        assert_eq!(layer.len(), 4);
    }

    #[test]
    fn unheld_rules_are_evicted_first() {
        let mut population = population(1);
        let mut rng = SmallRng::seed_from_u64(3);
        population.agents[0].unassign_rule(RuleId::new(1, 1, 2));
        population.agents[0].age_rules();
        population.insert_rule("Fisher", candidate(3.0), &mut rng).unwrap();
        let outcome = population.insert_rule("Fisher", candidate(4.0), &mut rng).unwrap();
        // Rule 1 is staler, but rule 2 has no holder at all.
        assert_eq!(
            outcome,
            RuleInsertion::Added {
                id: RuleId::new(1, 1, 4),
                evicted: Some(RuleId::new(1, 1, 2)),
            }
        );
    }

    #[test]
    fn prune_removes_only_unheld_action_rules() {
        let mut population = population(2);
        population.agents[0].unassign_rule(RuleId::new(1, 1, 1));
        population.agents[1].unassign_rule(RuleId::new(1, 1, 1));
        population.agents[1].unassign_rule(RuleId::new(1, 1, 2));
        let removed = population.prune_unassigned();
        assert_eq!(removed, vec![ArchetypeRule::new("Fisher", RuleId::new(1, 1, 1))]);
        let archetype = population.archetype("Fisher").unwrap();
        assert!(archetype.contains_rule(RuleId::new(1, 1, 0)));
        assert!(archetype.contains_rule(RuleId::new(1, 1, 2)));
    }

    #[test]
    fn pruning_names_the_archetype_of_each_removed_rule() {
        let mut population = population(1);
        let trader = Archetype::from_definition(ArchetypeDefinition {
            name: String::from("Trader"),
            name_prefix: String::from("T"),
            ..fixtures::fisher_definition()
        })
        .unwrap();
        let mut agent = fixtures::fisher_agent("T1", &trader);
        agent.unassign_rule(RuleId::new(1, 1, 2));
        population.add_archetype(trader).unwrap();
        population.add_agent(agent).unwrap();
        population.agents[0].unassign_rule(RuleId::new(1, 1, 2));

        let removed = population.prune_unassigned();
        assert_eq!(
            removed,
            vec![
                ArchetypeRule::new("Fisher", RuleId::new(1, 1, 2)),
                ArchetypeRule::new("Trader", RuleId::new(1, 1, 2)),
            ]
        );
    }

    #[test]
    fn eviction_ties_are_broken_at_random() {
        let mut evicted = BTreeSet::new();
        for seed in 0..40 {
            let mut population = population(1);
            let mut rng = SmallRng::seed_from_u64(seed);
            let third = population
                .insert_rule("Fisher", candidate(3.0), &mut rng)
                .unwrap()
                .rule_id()
                .unwrap();
            population.agents[0].assign_rule(third, BTreeMap::new());
            // Three held rules, all equally fresh.
            let outcome = population.insert_rule("Fisher", candidate(4.0), &mut rng).unwrap();
            let RuleInsertion::Added { evicted: Some(victim), .. } = outcome else {
                panic!("expected an eviction, got {outcome:?}");
            };
            evicted.insert(victim);
        }
        assert_eq!(
            evicted,
            [RuleId::new(1, 1, 1), RuleId::new(1, 1, 2), RuleId::new(1, 1, 3)]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn household_peers_compare_household_values() {
        let mut population = population(3);
        let ids: Vec<AgentId> = population.agents.iter().map(|a| a.id.clone()).collect();
        population.connect(&ids[0], &ids[1]).unwrap();
        population.connect(&ids[0], &ids[2]).unwrap();
        assert_eq!(population.same_household_peers(0).unwrap(), vec![1, 2]);

        population.agents[0].variables.set("Household", Value::Integer(1));
        population.agents[1].variables.set("Household", Value::Integer(1));
        population.agents[2].variables.set("Household", Value::Integer(2));
        assert_eq!(population.same_household_peers(0).unwrap(), vec![1]);
    }

    #[test]
    fn spawn_names_agents_from_prefix() {
        let mut population = population(2);
        let id = population.spawn("Fisher").unwrap();
        assert_eq!(id, AgentId::new("F3"));
        assert!(population.agent(&id).unwrap().holds(RuleId::new(1, 1, 0)));
    }
}
