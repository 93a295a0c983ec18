//! End-of-iteration upkeep of the rule bases.

use cogent_agents::Population;
use cogent_types::ArchetypeRule;
use tracing::debug;

/// Age every active agent's rules by one iteration, then drop action rules
/// no agent holds any more. Returns the removed rules.
pub fn run(population: &mut Population) -> Vec<ArchetypeRule> {
    population.age_rules();
    let removed = population.prune_unassigned();
    if !removed.is_empty() {
        debug!(removed = removed.len(), "Unassigned rules pruned");
    }
    removed
}
