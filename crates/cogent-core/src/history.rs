//! Bounded history of completed iteration snapshots.
//!
//! The iteration in progress is owned by the orchestrator; only finished
//! iterations are pushed here. The learning cursor therefore reads the
//! previous iteration as [`History::latest`] and the one before it as
//! [`History::before_latest`].

use std::collections::{BTreeMap, VecDeque};

use cogent_agents::AgentState;
use cogent_types::AgentId;

/// Every agent's state at the end of one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSnapshot<C> {
    /// 1-based iteration number.
    pub iteration: u64,
    /// Agent states keyed by agent id.
    pub states: BTreeMap<AgentId, AgentState<C>>,
}

impl<C> IterationSnapshot<C> {
    /// State of one agent, if it existed in this iteration.
    pub fn state(&self, agent: &AgentId) -> Option<&AgentState<C>> {
        self.states.get(agent)
    }
}

/// Completed snapshots, oldest first, optionally capped.
#[derive(Debug, Clone)]
pub struct History<C> {
    depth: Option<usize>,
    snapshots: VecDeque<IterationSnapshot<C>>,
}

impl<C> History<C> {
    /// An empty history retaining at most `depth` snapshots (`None` keeps
    /// everything).
    pub const fn new(depth: Option<usize>) -> Self {
        Self {
            depth,
            snapshots: VecDeque::new(),
        }
    }

    /// Append a finished iteration, dropping the oldest beyond the cap.
    pub fn push(&mut self, snapshot: IterationSnapshot<C>) {
        self.snapshots.push_back(snapshot);
        if let Some(depth) = self.depth {
            while self.snapshots.len() > depth {
                self.snapshots.pop_front();
            }
        }
    }

    /// The most recent finished iteration.
    pub fn latest(&self) -> Option<&IterationSnapshot<C>> {
        self.snapshots.back()
    }

    /// The iteration finished before [`History::latest`].
    pub fn before_latest(&self) -> Option<&IterationSnapshot<C>> {
        self.snapshots.len().checked_sub(2).and_then(|i| self.snapshots.get(i))
    }

    /// Retained snapshots, most recent first.
    pub fn iter_back(&self) -> impl Iterator<Item = &IterationSnapshot<C>> {
        self.snapshots.iter().rev()
    }

    /// Retained snapshots, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &IterationSnapshot<C>> {
        self.snapshots.iter()
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(iteration: u64) -> IterationSnapshot<u8> {
        IterationSnapshot {
            iteration,
            states: BTreeMap::new(),
        }
    }

    #[test]
    fn cursor_reads_latest_two() {
        let mut history = History::new(None);
        assert!(history.latest().is_none());
        history.push(snapshot(1));
        assert!(history.before_latest().is_none());
        history.push(snapshot(2));
        history.push(snapshot(3));
        assert_eq!(history.latest().map(|s| s.iteration), Some(3));
        assert_eq!(history.before_latest().map(|s| s.iteration), Some(2));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn depth_caps_retained_snapshots() {
        let mut history = History::new(Some(3));
        for i in 1..=10 {
            history.push(snapshot(i));
        }
        let kept: Vec<u64> = history.iter().map(|s| s.iteration).collect();
        assert_eq!(kept, vec![8, 9, 10]);
        let back: Vec<u64> = history.iter_back().map(|s| s.iteration).collect();
        assert_eq!(back, vec![10, 9, 8]);
    }
}
