//! A demonstration domain: fishers sharing one logistic fish stock.
//!
//! Before each iteration every fisher sees the current biomass as its
//! `Stock` variable. After action taking each fisher lands
//! `catchability * Effort * biomass` (scaled down when the fleet would take
//! more than the stock), earns `price * catch - cost * Effort` as `Income`,
//! and the stock regrows logistically.

use cogent_agents::Population;
use cogent_core::{Domain, EngineError};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::HostError;

/// Variable fishers read the biomass from.
pub const STOCK_VARIABLE: &str = "Stock";
/// Variable fishers set through their rules.
pub const EFFORT_VARIABLE: &str = "Effort";
/// Variable the domain writes each fisher's earnings to.
pub const INCOME_VARIABLE: &str = "Income";
/// Variable the domain writes each fisher's landings to.
pub const CATCH_VARIABLE: &str = "Catch";

/// Parameters of the fishery, read from the `fishery` key.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FisheryConfig {
    /// Biomass at start.
    #[serde(default = "default_initial_biomass")]
    pub initial_biomass: f64,

    /// Carrying capacity of the stock.
    #[serde(default = "default_carrying_capacity")]
    pub carrying_capacity: f64,

    /// Intrinsic growth rate per iteration.
    #[serde(default = "default_growth_rate")]
    pub growth_rate: f64,

    /// Share of the biomass one unit of effort lands.
    #[serde(default = "default_catchability")]
    pub catchability: f64,

    /// Price per unit of catch.
    #[serde(default = "default_price")]
    pub price: f64,

    /// Cost per unit of effort.
    #[serde(default = "default_effort_cost")]
    pub effort_cost: f64,
}

impl Default for FisheryConfig {
    fn default() -> Self {
        Self {
            initial_biomass: default_initial_biomass(),
            carrying_capacity: default_carrying_capacity(),
            growth_rate: default_growth_rate(),
            catchability: default_catchability(),
            price: default_price(),
            effort_cost: default_effort_cost(),
        }
    }
}

impl FisheryConfig {
    /// Parse the `fishery` section of a YAML document; defaults apply when
    /// the section is absent.
    pub fn parse(yaml: &str) -> Result<Self, HostError> {
        let raw: serde_yml::Value = serde_yml::from_str(yaml).map_err(|e| HostError::Scenario {
            message: format!("failed to parse YAML: {e}"),
        })?;
        match raw.get("fishery") {
            Some(section) => serde_yml::from_value(section.clone()).map_err(|e| HostError::Scenario {
                message: format!("failed to parse fishery: {e}"),
            }),
            None => Ok(Self::default()),
        }
    }
}

const fn default_initial_biomass() -> f64 {
    800.0
}

const fn default_carrying_capacity() -> f64 {
    1000.0
}

const fn default_growth_rate() -> f64 {
    0.3
}

const fn default_catchability() -> f64 {
    0.01
}

const fn default_price() -> f64 {
    2.0
}

const fn default_effort_cost() -> f64 {
    1.0
}

/// The fishery domain state.
#[derive(Debug, Clone)]
pub struct Fishery {
    config: FisheryConfig,
    biomass: f64,
    landings: Vec<f64>,
}

impl Fishery {
    /// A fishery at its initial biomass.
    pub const fn new(config: FisheryConfig) -> Self {
        Self {
            config,
            biomass: config.initial_biomass,
            landings: Vec::new(),
        }
    }

    /// Current biomass.
    pub const fn biomass(&self) -> f64 {
        self.biomass
    }

    /// Total catch of every completed iteration, in order.
    pub fn landings(&self) -> &[f64] {
        &self.landings
    }

    fn regrow(&mut self, harvest: f64) {
        let FisheryConfig {
            carrying_capacity: k,
            growth_rate: r,
            ..
        } = self.config;
        let growth = r * self.biomass * (1.0 - self.biomass / k);
        self.biomass = (self.biomass + growth - harvest).max(0.0);
    }
}

impl Domain for Fishery {
    type Context = ();

    fn pre_iteration(&mut self, _iteration: u64, population: &mut Population) -> Result<(), EngineError> {
        for idx in 0..population.len() {
            let (agent, _) = population.split_mut(idx)?;
            agent.variables.set(STOCK_VARIABLE, self.biomass);
        }
        Ok(())
    }

    fn post_iteration(&mut self, iteration: u64, population: &mut Population) -> Result<(), EngineError> {
        let mut efforts = Vec::with_capacity(population.len());
        for agent in population.agents().iter().filter(|a| a.active) {
            let archetype = population.archetype(&agent.archetype)?;
            let effort = agent.number(&archetype.variables, EFFORT_VARIABLE)?.max(0.0);
            efforts.push(effort);
        }
        let demand: f64 = efforts.iter().map(|e| self.config.catchability * e * self.biomass).sum();
        let scale = if demand > self.biomass && demand > 0.0 {
            self.biomass / demand
        } else {
            1.0
        };

        let mut harvest = 0.0;
        for idx in 0..population.len() {
            let (agent, archetype) = population.split_mut(idx)?;
            if !agent.active {
                continue;
            }
            let effort = agent.number(&archetype.variables, EFFORT_VARIABLE)?.max(0.0);
            let catch = self.config.catchability * effort * self.biomass * scale;
            let income = self.config.price.mul_add(catch, -self.config.effort_cost * effort);
            agent.variables.set(CATCH_VARIABLE, catch);
            agent.variables.set(INCOME_VARIABLE, income);
            debug!(agent = %agent.id, effort, catch, income, "Fisher landed catch");
            harvest += catch;
        }
        self.regrow(harvest);
        self.landings.push(harvest);
        info!(iteration, harvest, biomass = self.biomass, "Fishery updated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::collections::BTreeMap;

    use cogent_agents::{Agent, Archetype, ArchetypeDefinition, Goal, RuleLayerConfig, RuleSetDefinition, Variables};
    use cogent_types::{AgentId, Tendency, Value};

    use super::*;

    fn population(efforts: &[f64]) -> Population {
        let archetype = Archetype::from_definition(ArchetypeDefinition {
            name: String::from("Fisher"),
            name_prefix: String::from("F"),
            variables: Variables::new(),
            goals: vec![Goal::new("Income", Tendency::Maximize, "Income")],
            rule_sets: vec![RuleSetDefinition {
                associated_goals: Vec::new(),
                layers: vec![RuleLayerConfig::default()],
            }],
            rules: Vec::new(),
            use_importance_adjusting: true,
            do_nothing_influence: BTreeMap::new(),
        })
        .unwrap();
        let agents: Vec<Agent> = efforts
            .iter()
            .enumerate()
            .map(|(n, &effort)| {
                let mut agent = Agent::new(AgentId::new(format!("F{}", n + 1)), &archetype);
                agent.variables.set(EFFORT_VARIABLE, effort);
                agent
            })
            .collect();
        let mut population = Population::new();
        population.add_archetype(archetype).unwrap();
        for agent in agents {
            population.add_agent(agent).unwrap();
        }
        population
    }

    #[test]
    fn fishers_see_the_stock_and_earn_from_effort() {
        let mut fishery = Fishery::new(FisheryConfig::default());
        let mut population = population(&[1.0, 3.0]);
        fishery.pre_iteration(1, &mut population).unwrap();
        let first = population.agent(&AgentId::new("F1")).unwrap();
        assert_eq!(first.variables.get(STOCK_VARIABLE), Some(&Value::Number(800.0)));

        fishery.post_iteration(1, &mut population).unwrap();
        let second = population.agent(&AgentId::new("F2")).unwrap();
        // 0.01 * 3 * 800 = 24 landed, 2 * 24 - 3 = 45 earned.
        assert_eq!(second.variables.get(CATCH_VARIABLE), Some(&Value::Number(24.0)));
        assert_eq!(second.variables.get(INCOME_VARIABLE), Some(&Value::Number(45.0)));
        assert_eq!(fishery.landings(), &[32.0]);
        // 800 + 0.3 * 800 * 0.2 - 32 = 816
        assert!((fishery.biomass() - 816.0).abs() < 1e-9);
    }

    #[test]
    fn fishery_section_overrides_defaults() {
        let config = FisheryConfig::parse("fishery:\n  price: 3.5\n").unwrap();
        assert_eq!(config.price, 3.5);
        assert_eq!(config.carrying_capacity, 1000.0);
        assert_eq!(FisheryConfig::parse("run: {}\n").unwrap(), FisheryConfig::default());
    }

    #[test]
    fn sample_configuration_runs() {
        use cogent_core::{EngineConfig, Simulation, StopReason};
        use rand::SeedableRng;
        use rand::rngs::SmallRng;

        use crate::scenario::{ScenarioConfig, build_population};

        let yaml = include_str!("../../../cogent.yaml");
        let mut config = EngineConfig::parse(yaml).unwrap();
        config.run.iterations = 5;
        let scenario = ScenarioConfig::parse(yaml).unwrap();
        let mut rng = SmallRng::seed_from_u64(config.run.seed);
        let population = build_population(&scenario, &mut rng).unwrap();
        assert_eq!(population.len(), 12);

        let fishery = Fishery::new(FisheryConfig::parse(yaml).unwrap());
        let mut simulation = Simulation::new(config, fishery, population).unwrap();
        let summary = simulation.run().unwrap();
        assert_eq!(summary.stop_reason, StopReason::Completed);
        assert_eq!(summary.iterations_completed, 5);
        assert_eq!(simulation.domain().landings().len(), 5);
    }

    #[test]
    fn fleet_cannot_take_more_than_the_stock() {
        let config = FisheryConfig {
            initial_biomass: 100.0,
            catchability: 0.5,
            ..FisheryConfig::default()
        };
        let mut fishery = Fishery::new(config);
        let mut population = population(&[2.0, 2.0]);
        fishery.post_iteration(1, &mut population).unwrap();
        assert!((fishery.landings()[0] - 100.0).abs() < 1e-9);
        assert!(fishery.biomass() >= 0.0);
    }
}
