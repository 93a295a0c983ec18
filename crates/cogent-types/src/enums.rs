//! Enumeration types shared by the rule model and the cognitive processes.

use serde::{Deserialize, Serialize};

/// How an agent wants a goal's reference variable to behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tendency {
    /// Larger values are always better.
    Maximize,
    /// Smaller values are always better.
    Minimize,
    /// Satisfied while the value is at or above the focal value.
    #[serde(alias = "EqualToOrAboveFocalValue")]
    AtOrAboveFocal,
    /// Satisfied while the value is at or below the focal value.
    #[serde(alias = "EqualToOrBelowFocalValue")]
    AtOrBelowFocal,
}

impl Tendency {
    /// Stable label used in logs and error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Maximize => "maximize",
            Self::Minimize => "minimize",
            Self::AtOrAboveFocal => "at_or_above_focal",
            Self::AtOrBelowFocal => "at_or_below_focal",
        }
    }
}

impl core::fmt::Display for Tendency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The direction an agent expects it must push a goal's value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnticipatedDirection {
    /// The value should increase.
    Up,
    /// The value should decrease.
    Down,
    /// The value is fine where it is.
    #[default]
    Stay,
}

/// Comparison operator used by a rule antecedent part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// `==`
    #[serde(rename = "==")]
    Equal,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
    /// `>`
    #[serde(rename = ">")]
    Greater,
    /// `>=`
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// `<`
    #[serde(rename = "<")]
    Less,
    /// `<=`
    #[serde(rename = "<=")]
    LessOrEqual,
}

impl ComparisonOperator {
    /// Whether the operator only tests equality (usable on booleans).
    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Equal | Self::NotEqual)
    }

    /// The operator's source symbol.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
        }
    }
}

impl core::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Sign of the relationship between a layer's consequent and a goal.
///
/// `Positive` means raising the consequent value is expected to raise the
/// goal's reference variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsequentSign {
    /// Consequent and goal move together.
    #[default]
    #[serde(rename = "+")]
    Positive,
    /// Consequent and goal move in opposite directions.
    #[serde(rename = "-")]
    Negative,
}

/// Key of a rule history inside an agent's per-iteration state.
///
/// Agents bound to domain decision contexts (sites, management areas) keep
/// one history per context; all other agents use the single
/// [`ContextKey::Unbound`] key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContextKey<C> {
    /// The synthetic key of an agent that is not context-bound.
    Unbound,
    /// A domain-supplied decision context.
    Site(C),
}

impl<C> ContextKey<C> {
    /// The domain context, if this key is bound to one.
    pub const fn site(&self) -> Option<&C> {
        match self {
            Self::Unbound => None,
            Self::Site(c) => Some(c),
        }
    }
}

impl<C: core::fmt::Display> core::fmt::Display for ContextKey<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unbound => f.write_str("unbound"),
            Self::Site(c) => write!(f, "{c}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tendency_accepts_long_focal_aliases() {
        let parsed: Result<Tendency, _> = serde_json::from_str("\"EqualToOrAboveFocalValue\"");
        assert_eq!(parsed.ok(), Some(Tendency::AtOrAboveFocal));
        let parsed: Result<Tendency, _> = serde_json::from_str("\"AtOrBelowFocal\"");
        assert_eq!(parsed.ok(), Some(Tendency::AtOrBelowFocal));
    }

    #[test]
    fn operators_deserialize_from_symbols() {
        let ops: Vec<ComparisonOperator> =
            serde_json::from_str(r#"["==", "!=", ">", ">=", "<", "<="]"#).unwrap_or_default();
        assert_eq!(ops.len(), 6);
        assert_eq!(ops.first().copied(), Some(ComparisonOperator::Equal));
        assert_eq!(ops.last().map(|op| op.symbol()), Some("<="));
    }

    #[test]
    fn consequent_sign_uses_plus_minus() {
        let sign: Result<ConsequentSign, _> = serde_json::from_str("\"-\"");
        assert_eq!(sign.ok(), Some(ConsequentSign::Negative));
    }

    #[test]
    fn unbound_context_has_no_site() {
        let key: ContextKey<u32> = ContextKey::Unbound;
        assert_eq!(key.site(), None);
        assert_eq!(ContextKey::Site(4_u32).site(), Some(&4));
    }
}
