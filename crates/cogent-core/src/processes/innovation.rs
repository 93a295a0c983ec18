//! Innovation: derive a new rule from the last real action in a layer.
//!
//! The prototype is the most recent non-do-nothing rule the agent activated
//! in the layer and context. Its consequent value is pushed toward the
//! layer's upper or lower bound, depending on the goal's anticipated
//! direction and the layer's consequent sign for that goal:
//!
//! | direction | sign | move      |
//! |-----------|------|-----------|
//! | Up        | +    | toward max|
//! | Up        | -    | toward min|
//! | Down      | +    | toward min|
//! | Down      | -    | toward max|
//!
//! The antecedent is frozen to the agent's live variable values and the
//! new rule inherits the prototype's influences, scaled by the relative
//! change of the consequent.

use std::collections::BTreeMap;

use cogent_agents::{AgentError, Archetype, GoalState, Population, Rule, RuleInsertion};
use cogent_types::{AgentId, AnticipatedDirection, ConsequentSign, Value};
use rand::Rng;
use tracing::{debug, trace};

use super::Target;
use crate::config::InnovationConfig;
use crate::domain::DecisionContext;
use crate::error::EngineError;
use crate::history::History;
use crate::random;

/// Try to generate a rule for a layer and assign it to the agent.
///
/// Returns the insertion outcome when the agent was assigned a rule (new or
/// structurally identical existing one), `None` when no rule was produced.
#[allow(clippy::too_many_lines)]
pub fn innovate<C: DecisionContext>(
    population: &mut Population,
    target: Target<'_, C>,
    goal_state: &GoalState,
    history: &History<C>,
    config: &InnovationConfig,
    rng: &mut impl Rng,
) -> Result<Option<RuleInsertion>, EngineError> {
    let direction = goal_state.anticipated_direction;
    if direction == AnticipatedDirection::Stay {
        return Ok(None);
    }

    let (agent, archetype) = population.pair(target.agent)?;
    let Some(prototype) = find_prototype(history, &agent.id, target, archetype) else {
        trace!(agent = %agent.id, layer = %target.layer, "No prototype rule to innovate from");
        return Ok(None);
    };
    let layer = archetype.layer(target.layer)?;
    if !layer.config.modifiable && !prototype.is_modifiable {
        return Ok(None);
    }

    let private = &agent.variables;
    let shared = &archetype.variables;
    let min = layer.min_value(private, shared)?;
    let max = layer.max_value(private, shared)?;
    if min > max || !min.is_finite() || !max.is_finite() {
        debug!(agent = %agent.id, layer = %target.layer, min, max, "Unusable consequent bounds");
        return Ok(None);
    }
    let old = prototype.consequent.resolve_number(private, shared)?;
    let sign = layer.config.sign_for(target.goal);
    let toward_max = matches!(
        (direction, sign),
        (AnticipatedDirection::Up, ConsequentSign::Positive)
            | (AnticipatedDirection::Down, ConsequentSign::Negative)
    );

    let drawn = if toward_max {
        if old >= max {
            return Ok(None);
        }
        random::power_law_between(rng, old.max(min), max, config.power_law_exponent)
    } else {
        if old <= min {
            return Ok(None);
        }
        random::power_law_between(rng, old.min(max), min, config.power_law_exponent)
    };
    let drawn = drawn.clamp(min, max);
    let integer_source = prototype.consequent.reference.is_none()
        && matches!(prototype.consequent.value, Value::Integer(_));
    let new_value = if integer_source {
        let rounded = drawn.round();
        if rounded < min || rounded > max {
            return Ok(None);
        }
        // Rounded and within finite bounds.
        #[allow(clippy::cast_possible_truncation)]
        let whole = rounded as i64;
        Value::Integer(whole)
    } else {
        Value::Number(drawn)
    };
    let new_number = new_value.as_f64().unwrap_or(drawn);

    let antecedent = prototype
        .antecedent
        .iter()
        .map(|part| {
            agent
                .get_variable(shared, &part.variable)
                .map(|live| part.renew(live.clone()))
        })
        .collect::<Result<Vec<_>, AgentError>>()?;
    let consequent = prototype.consequent.renew(new_value);
    let candidate = prototype.renew(antecedent, consequent);

    let proportion = if old == 0.0 {
        0.0
    } else {
        ((new_number - old) / old).abs()
    };
    let mut row = BTreeMap::new();
    for goal in &agent.goals {
        let base = agent.influence(prototype.id, goal);
        let consequent_up = new_number > old;
        let goal_up = consequent_up == (layer.config.sign_for(goal) == ConsequentSign::Positive);
        let delta = base.abs() * proportion;
        row.insert(goal.clone(), if goal_up { base + delta } else { base - delta });
    }

    let archetype_name = archetype.name.clone();
    let spans_layers = archetype.layer_count(target.layer.set) > 1;
    let agent_id = agent.id.clone();
    let prototype_id = prototype.id;

    let insertion = population.insert_rule(&archetype_name, candidate, rng)?;
    let Some(id) = insertion.rule_id() else {
        return Ok(None);
    };
    let (agent, archetype) = population.split_mut(target.agent)?;
    agent.assign_rule(id, row);
    if spans_layers {
        archetype.apply_rule(id, &mut agent.variables)?;
    }
    debug!(
        agent = %agent_id,
        prototype = %prototype_id,
        rule = %id,
        old,
        new = new_number,
        reused = matches!(insertion, RuleInsertion::Existing(_)),
        "Innovation produced rule"
    );
    Ok(Some(insertion))
}

/// The most recent action rule the agent activated in the layer and
/// context, skipping iterations that activated the do-nothing rule or a rule
/// the rule base no longer holds.
fn find_prototype<C: DecisionContext>(
    history: &History<C>,
    agent: &AgentId,
    target: Target<'_, C>,
    archetype: &Archetype,
) -> Option<Rule> {
    for snapshot in history.iter_back() {
        let activated = snapshot
            .state(agent)
            .and_then(|state| state.history(target.context))
            .and_then(|h| h.activated_in(target.layer));
        let Some(id) = activated else {
            continue;
        };
        match archetype.rule(id) {
            Ok(rule) if rule.is_action => return Some(rule.clone()),
            Ok(_) | Err(_) => {}
        }
    }
    None
}
