//! Anticipatory learning: update goal states from live values, learn the
//! influence of last iteration's rules, and rank goals for this iteration.

use cogent_agents::{Agent, AgentState, Archetype, Goal, GoalState};
use cogent_types::{AnticipatedDirection, Tendency};
use rand::Rng;
use tracing::{debug, trace};

use crate::domain::DecisionContext;
use crate::error::EngineError;
use crate::random;

const PROCESS: &str = "anticipatory learning";

/// Run anticipatory learning for one agent and return its goal ranking.
///
/// `state` is the agent's state for the iteration in progress, `prior` its
/// state at the end of the previous iteration and `twice_prior` the one
/// before that, if retained. Rules activated in `prior` learn the goal's
/// new anticipated influence.
pub fn learn<C: DecisionContext>(
    agent: &mut Agent,
    archetype: &Archetype,
    state: &mut AgentState<C>,
    prior: &AgentState<C>,
    twice_prior: Option<&AgentState<C>>,
    rng: &mut impl Rng,
) -> Result<Vec<String>, EngineError> {
    let goals = agent.goals.clone();
    for name in &goals {
        let goal = archetype.goal(name)?;
        let twice_value = twice_prior
            .and_then(|s| s.goals.get(name))
            .map(|g| g.value);
        let goal_state = state.goal_mut(name)?;
        observe(agent, archetype, goal, goal_state, twice_value)?;
        let influence = goal_state.anticipated_influence;

        let learned: Vec<_> = prior
            .activated_rules()
            .filter(|id| archetype.rule_set(id.set).is_some_and(|set| set.serves(name)))
            .filter(|id| agent.holds(*id))
            .collect();
        for rule in learned {
            agent.set_influence(rule, name, influence);
            trace!(agent = %agent.id, rule = %rule, goal = %name, influence, "Influence learned");
        }

        let (direction, confidence) = judge(goal, goal_state)?;
        goal_state.anticipated_direction = direction;
        goal_state.confidence = confidence;
        debug!(
            agent = %agent.id,
            goal = %name,
            value = goal_state.value,
            focal = goal_state.focal_value,
            direction = ?direction,
            confidence,
            "Goal assessed"
        );
    }
    rank_goals(agent, archetype, state, rng)
}

/// Refresh a goal state's value, focal value, differences and influence.
fn observe(
    agent: &Agent,
    archetype: &Archetype,
    goal: &Goal,
    goal_state: &mut GoalState,
    twice_prior_value: Option<f64>,
) -> Result<(), EngineError> {
    let shared = &archetype.variables;
    goal_state.value = agent.number(shared, &goal.reference_variable)?;
    if goal.change_focal_value_on_prior {
        goal_state.focal_value = goal.focal_reduction_factor() * goal_state.prior_value;
    }
    if let Some(reference) = &goal.focal_value_reference {
        goal_state.focal_value = agent.number(shared, reference)?;
    }

    goal_state.diff_current_and_focal = goal_state.value - goal_state.focal_value;
    goal_state.diff_prior_and_focal = goal_state.prior_value - goal_state.prior_focal_value;
    goal_state.diff_current_and_prior = goal_state.value - goal_state.prior_value;
    if let Some(twice) = twice_prior_value {
        goal_state.diff_prior_and_twice_prior = goal_state.prior_value - twice;
    }

    goal_state.anticipated_influence = if goal.is_cumulative {
        goal_state.diff_current_and_prior
    } else {
        goal_state.value
    };
    Ok(())
}

/// Anticipated direction and confidence for a goal's tendency.
fn judge(goal: &Goal, s: &GoalState) -> Result<(AnticipatedDirection, bool), EngineError> {
    use AnticipatedDirection::{Down, Stay, Up};

    let verdict = match goal.tendency {
        Tendency::AtOrAboveFocal => {
            if s.value < s.focal_value {
                (Up, false)
            } else {
                (Stay, true)
            }
        }
        Tendency::Maximize => {
            let improving = if goal.is_cumulative {
                s.diff_current_and_prior >= s.diff_prior_and_twice_prior
            } else {
                s.prior_value <= s.value
            };
            if improving { (Stay, true) } else { (Up, false) }
        }
        Tendency::Minimize => {
            let improving = if goal.is_cumulative {
                s.diff_current_and_prior <= s.diff_prior_and_twice_prior
            } else {
                s.prior_value >= s.value
            };
            if improving { (Stay, true) } else { (Down, false) }
        }
        Tendency::AtOrBelowFocal => {
            return Err(EngineError::UnsupportedTendency {
                process: PROCESS,
                tendency: goal.tendency,
            });
        }
    };
    Ok(verdict)
}

/// Order the agent's goals for this iteration and record adjusted
/// importances.
///
/// Goals with zero importance never enter the weighted draw. Goals lacking
/// confidence get their importance boosted by their relative gap to the
/// focal value (when the archetype enables importance adjusting); confident
/// goals share what remains. The draw orders every weighted goal; the
/// zero-weight remainder follows, ranking-enabled goals first.
pub fn rank_goals<C: DecisionContext>(
    agent: &Agent,
    archetype: &Archetype,
    state: &mut AgentState<C>,
    rng: &mut impl Rng,
) -> Result<Vec<String>, EngineError> {
    if agent.goals.len() <= 1 {
        return Ok(agent.goals.clone());
    }

    let mut weights: Vec<(String, f64)> = Vec::with_capacity(agent.goals.len());
    if archetype.use_importance_adjusting {
        let mut boosted_total = 0.0;
        let mut confident_importance = 0.0;
        for name in &agent.goals {
            let goal_state = state.goal(name)?;
            if goal_state.confidence {
                confident_importance += goal_state.importance;
            } else {
                let gap = relative_gap(agent, archetype, name, goal_state);
                boosted_total = goal_state.importance.mul_add(1.0 + gap, boosted_total);
            }
        }
        let remaining = (1.0 - boosted_total).max(0.0);
        for name in &agent.goals {
            let goal_state = state.goal(name)?;
            let adjusted = if goal_state.confidence {
                if confident_importance > 0.0 {
                    remaining * goal_state.importance / confident_importance
                } else {
                    0.0
                }
            } else {
                let gap = relative_gap(agent, archetype, name, goal_state);
                goal_state.importance * (1.0 + gap)
            };
            weights.push((name.clone(), adjusted));
        }
    } else {
        for name in &agent.goals {
            weights.push((name.clone(), state.goal(name)?.importance));
        }
    }

    let total: f64 = weights.iter().map(|(_, w)| *w).sum();
    if total > 1.0 {
        for (_, weight) in &mut weights {
            *weight /= total;
        }
    }
    for (name, weight) in &weights {
        state.goal_mut(name)?.adjusted_importance = *weight;
    }

    let drawable: Vec<(String, f64)> = weights
        .iter()
        .filter(|(name, _)| state.goals.get(name).is_some_and(|g| g.importance > 0.0))
        .cloned()
        .collect();
    let mut ranking = random::weighted_order(rng, &drawable);
    append_remainder(agent, archetype, &mut ranking);
    debug!(agent = %agent.id, ranking = ?ranking, "Goals ranked");
    Ok(ranking)
}

/// Goals ordered by adjusted importance, for iterations without learning.
pub fn static_ranking<C: DecisionContext>(
    agent: &Agent,
    archetype: &Archetype,
    state: &AgentState<C>,
) -> Vec<String> {
    let mut weighted: Vec<(String, f64)> = agent
        .goals
        .iter()
        .filter_map(|name| {
            state
                .goals
                .get(name)
                .filter(|g| g.importance > 0.0)
                .map(|g| (name.clone(), g.adjusted_importance))
        })
        .collect();
    weighted.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut ranking: Vec<String> = weighted.into_iter().map(|(name, _)| name).collect();
    append_remainder(agent, archetype, &mut ranking);
    ranking
}

fn append_remainder(agent: &Agent, archetype: &Archetype, ranking: &mut Vec<String>) {
    let remainder: Vec<&String> = agent.goals.iter().filter(|g| !ranking.contains(*g)).collect();
    let enabled = |name: &str| archetype.goal(name).is_ok_and(|g| g.ranking_enabled);
    let (first, last): (Vec<&String>, Vec<&String>) =
        remainder.into_iter().partition(|name| enabled(name));
    ranking.extend(first.into_iter().chain(last).cloned());
}

/// `|value - focal|` relative to the largest gap the goal can have, in
/// `[0, 1]`.
///
/// The largest gap comes from the bounds of the first bounded layer serving
/// the goal, or else from the magnitudes of the focal and current values.
fn relative_gap(agent: &Agent, archetype: &Archetype, goal: &str, s: &GoalState) -> f64 {
    let bounds = archetype.bounded_layer_for(goal).and_then(|layer| {
        let min = layer.min_value(&agent.variables, &archetype.variables).ok()?;
        let max = layer.max_value(&agent.variables, &archetype.variables).ok()?;
        Some((min, max))
    });
    let max_gap = match bounds {
        Some((min, max)) => (max - s.focal_value).abs().max((s.focal_value - min).abs()),
        None => s.focal_value.abs().max(s.value.abs()),
    };
    if max_gap <= 0.0 || !max_gap.is_finite() {
        return 0.0;
    }
    ((s.value - s.focal_value).abs() / max_gap).clamp(0.0, 1.0)
}
