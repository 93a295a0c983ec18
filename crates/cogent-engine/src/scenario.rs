//! Scenario loading: archetypes and the agents instantiated from them.
//!
//! The scenario lives under the `scenario` key of the same YAML file the
//! engine configuration is read from:
//!
//! ```yaml
//! scenario:
//!   archetypes:
//!     - name: Fisher
//!       name_prefix: F
//!       goals: [...]
//!       rule_sets: [...]
//!       rules: [...]
//!   agents:
//!     - archetype: Fisher
//!       count: 12
//!       household_size: 3
//!       neighbours: 2
//!       variables: { Effort: 1.0, Income: 0.0 }
//!       influence: { Income: 1.0 }
//! ```

use std::collections::BTreeMap;

use cogent_agents::{Archetype, ArchetypeDefinition, Population, Variables, HOUSEHOLD_VARIABLE};
use cogent_types::{AgentId, RuleId, Value};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::info;

use crate::error::HostError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Archetypes and agent groups of a run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    /// Archetype definitions.
    pub archetypes: Vec<ArchetypeDefinition>,

    /// Agent groups instantiated at start.
    #[serde(default)]
    pub agents: Vec<AgentGroup>,
}

/// A batch of agents of one archetype.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentGroup {
    /// Archetype name.
    pub archetype: String,

    /// Number of agents.
    #[serde(default = "default_count")]
    pub count: u32,

    /// Private variables every agent of the group starts with.
    #[serde(default)]
    pub variables: Variables,

    /// Initial anticipated influence of every action rule, per goal.
    #[serde(default)]
    pub influence: BTreeMap<String, f64>,

    /// Agents per household; 0 leaves agents without households.
    #[serde(default)]
    pub household_size: u32,

    /// Random connections each agent makes within its group.
    #[serde(default)]
    pub neighbours: usize,
}

const fn default_count() -> u32 {
    1
}

impl ScenarioConfig {
    /// Parse the `scenario` section of a YAML document.
    pub fn parse(yaml: &str) -> Result<Self, HostError> {
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| HostError::Scenario {
            message: format!("failed to parse YAML: {e}"),
        })?;
        let Some(section) = raw.get("scenario") else {
            return Err(HostError::Scenario {
                message: String::from("missing `scenario` section"),
            });
        };
        serde_yml::from_value(section.clone()).map_err(|e| HostError::Scenario {
            message: format!("failed to parse scenario: {e}"),
        })
    }
}

// -----------------------------------------------------------------------
// Population building
// -----------------------------------------------------------------------

/// Build archetypes and agents.
///
/// Agents hold every action rule of their archetype with the group's
/// influence row. Household members are connected to each other; each
/// agent additionally connects to `neighbours` random group members.
pub fn build_population(scenario: &ScenarioConfig, rng: &mut impl Rng) -> Result<Population, HostError> {
    let mut population = Population::new();
    for definition in &scenario.archetypes {
        population.add_archetype(Archetype::from_definition(definition.clone())?)?;
    }

    for group in &scenario.agents {
        let actions: Vec<RuleId> = population
            .archetype(&group.archetype)?
            .rules()
            .filter(|r| r.is_action)
            .map(|r| r.id)
            .collect();
        let mut members: Vec<AgentId> = Vec::new();
        let mut households: BTreeMap<u32, Vec<AgentId>> = BTreeMap::new();
        for ordinal in 0..group.count {
            let id = population.spawn(&group.archetype)?;
            let agent = population.agent_mut(&id)?;
            for (name, value) in group.variables.iter() {
                agent.variables.set(name.clone(), value.clone());
            }
            for &rule in &actions {
                agent.assign_rule(rule, group.influence.clone());
            }
            if let Some(household) = ordinal.checked_div(group.household_size) {
                agent
                    .variables
                    .set(HOUSEHOLD_VARIABLE, Value::Integer(i64::from(household)));
                households.entry(household).or_default().push(id.clone());
            }
            members.push(id);
        }

        for household in households.values() {
            for (n, a) in household.iter().enumerate() {
                for b in household.iter().skip(n.saturating_add(1)) {
                    population.connect(a, b)?;
                }
            }
        }
        for member in &members {
            let others: Vec<&AgentId> = members.iter().filter(|m| *m != member).collect();
            let picks: Vec<AgentId> = others
                .choose_multiple(rng, group.neighbours)
                .map(|m| (*m).clone())
                .collect();
            for other in &picks {
                population.connect(member, other)?;
            }
        }
        info!(
            archetype = %group.archetype,
            count = group.count,
            households = households.len(),
            "Agent group spawned"
        );
    }
    Ok(population)
}
