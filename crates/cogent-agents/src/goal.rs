//! Goals an archetype's agents try to satisfy.

use cogent_types::Tendency;
use serde::{Deserialize, Serialize};

/// A goal definition. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique goal name within the archetype.
    pub name: String,
    /// How the agent wants the reference variable to behave.
    pub tendency: Tendency,
    /// Variable whose live value is the goal's current value.
    pub reference_variable: String,
    /// Judge the goal on per-iteration deltas rather than raw values.
    #[serde(default)]
    pub is_cumulative: bool,
    /// Variable holding the focal value, read live each iteration.
    #[serde(default)]
    pub focal_value_reference: Option<String>,
    /// Recompute the focal value from the prior value every iteration.
    #[serde(default)]
    pub change_focal_value_on_prior: bool,
    /// Fraction of the prior value used as the recomputed focal value.
    /// Non-positive values mean "use the prior value unchanged".
    #[serde(default)]
    pub focal_value_reduction: f64,
    /// Order this goal ahead of other zero-weight goals in the ranking.
    #[serde(default = "default_ranking_enabled")]
    pub ranking_enabled: bool,
}

const fn default_ranking_enabled() -> bool {
    true
}

impl Goal {
    /// Create a goal with default flags.
    pub fn new(
        name: impl Into<String>,
        tendency: Tendency,
        reference_variable: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tendency,
            reference_variable: reference_variable.into(),
            is_cumulative: false,
            focal_value_reference: None,
            change_focal_value_on_prior: false,
            focal_value_reduction: 0.0,
            ranking_enabled: true,
        }
    }

    /// Mark the goal as cumulative.
    #[must_use]
    pub const fn cumulative(mut self) -> Self {
        self.is_cumulative = true;
        self
    }

    /// Read the focal value from the given variable.
    #[must_use]
    pub fn with_focal_reference(mut self, variable: impl Into<String>) -> Self {
        self.focal_value_reference = Some(variable.into());
        self
    }

    /// Recompute the focal value as `reduction * prior value`.
    #[must_use]
    pub const fn with_focal_from_prior(mut self, reduction: f64) -> Self {
        self.change_focal_value_on_prior = true;
        self.focal_value_reduction = reduction;
        self
    }

    /// The multiplier applied to the prior value when recomputing the focal.
    pub fn focal_reduction_factor(&self) -> f64 {
        if self.focal_value_reduction > 0.0 {
            self.focal_value_reduction
        } else {
            1.0
        }
    }
}
