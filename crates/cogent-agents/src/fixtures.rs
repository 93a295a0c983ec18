//! Shared test fixtures for the agents crate.

use std::collections::BTreeMap;

use cogent_types::{AgentId, ComparisonOperator, Tendency, Value};

use crate::agent::Agent;
use crate::archetype::{Archetype, ArchetypeDefinition, RuleSetDefinition};
use crate::goal::Goal;
use crate::layer::RuleLayerConfig;
use crate::rule::{AntecedentPart, Consequent, RuleDefinition};

/// One goal, one modifiable layer (capacity 4, bounds 0..10), two rules.
pub fn fisher_definition() -> ArchetypeDefinition {
    ArchetypeDefinition {
        name: String::from("Fisher"),
        name_prefix: String::from("F"),
        variables: [(String::from("Price"), Value::Number(2.0))]
            .into_iter()
            .collect(),
        goals: vec![Goal::new("Income", Tendency::Maximize, "Income")],
        rule_sets: vec![RuleSetDefinition {
            associated_goals: Vec::new(),
            layers: vec![RuleLayerConfig {
                max_rules: 4,
                modifiable: true,
                consequent_min: Some(0.0),
                consequent_max: Some(10.0),
                ..RuleLayerConfig::default()
            }],
        }],
        rules: vec![
            RuleDefinition {
                set: 1,
                layer: 1,
                antecedent: vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 10.0)],
                consequent: Consequent::new("Effort", 2.0),
                required_participants: None,
                is_modifiable: true,
            },
            RuleDefinition {
                set: 1,
                layer: 1,
                antecedent: vec![AntecedentPart::new("Stock", ComparisonOperator::Greater, 20.0)],
                consequent: Consequent::new("Effort", 6.0),
                required_participants: None,
                is_modifiable: true,
            },
        ],
        use_importance_adjusting: true,
        do_nothing_influence: BTreeMap::new(),
    }
}

/// The fisher archetype, built.
#[allow(clippy::unwrap_used)]
pub fn fisher() -> Archetype {
    Archetype::from_definition(fisher_definition()).unwrap()
}

/// A fisher agent holding every rule of the archetype.
pub fn fisher_agent(id: &str, archetype: &Archetype) -> Agent {
    let mut agent = Agent::new(AgentId::new(id), archetype);
    agent.variables.set("Stock", 30.0);
    agent.variables.set("Income", 0.0);
    for rule in archetype.rules().filter(|r| r.is_action) {
        agent.assign_rule(rule.id, BTreeMap::new());
    }
    agent
}
