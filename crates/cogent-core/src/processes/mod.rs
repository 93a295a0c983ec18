//! The cognitive processes an agent runs each iteration.
//!
//! Each process is a set of free functions over the [`Population`], the
//! agent's [`AgentState`] and the iteration [`History`]. Processes hold no
//! state of their own; randomness is always the caller's RNG.
//!
//! - [`anticipatory`] -- goal values, confidence, influence updates, ranking
//! - [`counterfactual`] -- would another matched rule have served better?
//! - [`innovation`] -- derive a new rule from the last real action
//! - [`social`] -- copy rules connected agents activated
//! - [`selection`] -- two-phase action selection with collective quorums
//! - [`taking`] -- apply activated rules
//!
//! [`Population`]: cogent_agents::Population
//! [`AgentState`]: cogent_agents::AgentState
//! [`History`]: crate::history::History

pub mod anticipatory;
pub mod counterfactual;
pub mod innovation;
pub mod selection;
pub mod social;
pub mod taking;

use cogent_types::{ContextKey, LayerKey, RuleId};

/// The agent, context, goal and layer a layer-level process works on.
#[derive(Debug)]
pub struct Target<'a, C> {
    /// Population index of the agent.
    pub agent: usize,
    /// Decision context.
    pub context: &'a ContextKey<C>,
    /// Goal the layer is being decided for.
    pub goal: &'a str,
    /// The layer.
    pub layer: LayerKey,
}

impl<C> Clone for Target<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Target<'_, C> {}

/// Rules sharing the extreme score, in input order.
///
/// `better(a, b)` tells whether score `a` beats score `b`.
// Ties are exact: equal influences come from copied or learned values.
#[allow(clippy::float_cmp)]
fn extreme_group(scored: &[(RuleId, f64)], better: impl Fn(f64, f64) -> bool) -> Vec<RuleId> {
    let mut best: Option<f64> = None;
    let mut group = Vec::new();
    for &(id, score) in scored {
        match best {
            Some(current) if better(current, score) => {}
            Some(current) if score == current => group.push(id),
            _ => {
                best = Some(score);
                group.clear();
                group.push(id);
            }
        }
    }
    group
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extreme_group_collects_ties() {
        let scored = [
            (RuleId::new(1, 1, 1), 5.0),
            (RuleId::new(1, 1, 2), 10.0),
            (RuleId::new(1, 1, 3), 10.0),
            (RuleId::new(1, 1, 4), -2.0),
        ];
        assert_eq!(
            extreme_group(&scored, |a, b| a > b),
            vec![RuleId::new(1, 1, 2), RuleId::new(1, 1, 3)]
        );
        assert_eq!(extreme_group(&scored, |a, b| a < b), vec![RuleId::new(1, 1, 4)]);
        assert!(extreme_group(&[], |a: f64, b: f64| a > b).is_empty());
    }
}
