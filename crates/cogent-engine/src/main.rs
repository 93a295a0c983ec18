//! Host binary for the Cogent engine.
//!
//! Runs the fishery demonstration domain: a fleet of fishers whose effort
//! rules are learned, invented, imitated, and selected by the engine while
//! the domain lands their catch and regrows the shared stock.
//!
//! # Startup Sequence
//!
//! 1. Read the YAML file named by the first argument (`cogent.yaml` by
//!    default); a missing file means defaults and an error for the
//!    scenario
//! 2. Load the engine configuration
//! 3. Initialize structured logging (tracing)
//! 4. Load the scenario and the fishery parameters
//! 5. Build the population
//! 6. Run the simulation
//! 7. Log the result

mod error;
mod fishery;
mod scenario;

use std::path::{Path, PathBuf};

use cogent_core::{EngineConfig, Simulation, StopReason};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::HostError;
use crate::fishery::{Fishery, FisheryConfig};
use crate::scenario::ScenarioConfig;

/// Default configuration file.
const DEFAULT_CONFIG_PATH: &str = "cogent.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration, the scenario, or the run fails.
fn main() -> anyhow::Result<()> {
    // 1. Read the configuration file.
    let path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let contents = read_config(&path)?;

    // 2. Load engine configuration.
    let config = EngineConfig::parse(&contents).map_err(HostError::from)?;

    // 3. Initialize structured logging.
    init_tracing(&config);
    info!(path = %path.display(), "cogent-engine starting");
    info!(
        iterations = config.run.iterations,
        seed = config.run.seed,
        history_depth = config.run.history_depth,
        "Configuration loaded"
    );

    // 4. Load scenario and domain parameters.
    let scenario = ScenarioConfig::parse(&contents)?;
    let fishery_config = FisheryConfig::parse(&contents)?;
    info!(
        archetypes = scenario.archetypes.len(),
        groups = scenario.agents.len(),
        biomass = fishery_config.initial_biomass,
        "Scenario loaded"
    );

    // 5. Build the population.
    let mut rng = StdRng::seed_from_u64(config.run.seed);
    let population = scenario::build_population(&scenario, &mut rng)?;

    // 6. Run the simulation.
    let mut simulation = Simulation::new(config, Fishery::new(fishery_config), population)
        .map_err(HostError::from)?;
    let summary = simulation.run().map_err(HostError::from)?;

    // 7. Log the result.
    let stop_reason = match summary.stop_reason {
        StopReason::Completed => "completed",
        StopReason::StoppageCondition => "stoppage_condition",
        StopReason::NoActiveAgents => "no_active_agents",
    };
    info!(
        iterations = summary.iterations_completed,
        stop_reason,
        rules_generated = summary.rules_generated,
        rules_removed = summary.rules_removed,
        final_biomass = simulation.domain().biomass(),
        total_landings = simulation.domain().landings().iter().sum::<f64>(),
        "cogent-engine finished"
    );
    Ok(())
}

/// Read the configuration file, or an empty document if it does not exist.
fn read_config(path: &Path) -> Result<String, HostError> {
    if !path.exists() {
        return Ok(String::new());
    }
    std::fs::read_to_string(path).map_err(|e| HostError::Scenario {
        message: format!("failed to read {}: {e}", path.display()),
    })
}

/// Install the tracing subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing(config: &EngineConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
