//! Typed variable values.
//!
//! The engine never interprets the domain's numbers; it only needs to store
//! them, compare them in rule antecedents, and perturb numeric consequents.
//! [`Value`] is the closed set of primitive kinds the engine recognises.

use core::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::enums::ComparisonOperator;

/// A variable value held in an agent or archetype variable store.
///
/// Deserializes untagged, so `true`, `3`, `2.5` and `"north"` map to
/// [`Value::Boolean`], [`Value::Integer`], [`Value::Number`] and
/// [`Value::Text`] respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A boolean flag.
    Boolean(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating-point number.
    Number(f64),
    /// Free text (names, categorical labels).
    Text(String),
}

/// The kind of a [`Value`], used in type-mismatch diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// [`Value::Boolean`].
    Boolean,
    /// [`Value::Integer`].
    Integer,
    /// [`Value::Number`].
    Number,
    /// [`Value::Text`].
    Text,
}

impl core::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Text => "text",
        };
        f.write_str(label)
    }
}

impl Value {
    /// The kind of this value.
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Numeric view of the value. Integers widen to `f64`.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Number(v) => Some(*v),
            Self::Boolean(_) | Self::Text(_) => None,
        }
    }

    /// Boolean view of the value.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view of the value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the value is numeric (integer or number).
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Number(_))
    }

    /// Order two values of compatible kinds.
    ///
    /// Integers compare exactly with each other and widen to `f64` against
    /// numbers. Returns `None` for incompatible kinds and for `NaN`.
    pub fn partial_cmp_value(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Evaluate `self <op> other`.
    ///
    /// Returns `None` when the two values cannot be compared with the
    /// operator (mismatched kinds, or an ordering operator on booleans).
    pub fn compare(&self, op: ComparisonOperator, other: &Self) -> Option<bool> {
        if matches!(self, Self::Boolean(_)) && !op.is_equality() {
            return None;
        }
        let ordering = self.partial_cmp_value(other)?;
        Some(match op {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::Greater => ordering == Ordering::Greater,
            ComparisonOperator::GreaterOrEqual => ordering != Ordering::Less,
            ComparisonOperator::Less => ordering == Ordering::Less,
            ComparisonOperator::LessOrEqual => ordering != Ordering::Greater,
        })
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(String::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_and_numbers_compare_numerically() {
        let five = Value::Integer(5);
        let five_and_half = Value::Number(5.5);
        assert_eq!(five.compare(ComparisonOperator::Less, &five_and_half), Some(true));
        assert_eq!(
            five.compare(ComparisonOperator::Equal, &Value::Number(5.0)),
            Some(true)
        );
        assert_eq!(
            five_and_half.compare(ComparisonOperator::GreaterOrEqual, &five),
            Some(true)
        );
    }

    #[test]
    fn booleans_only_support_equality() {
        let yes = Value::Boolean(true);
        assert_eq!(yes.compare(ComparisonOperator::Equal, &Value::Boolean(true)), Some(true));
        assert_eq!(yes.compare(ComparisonOperator::NotEqual, &Value::Boolean(false)), Some(true));
        assert_eq!(yes.compare(ComparisonOperator::Greater, &Value::Boolean(false)), None);
    }

    #[test]
    fn mismatched_kinds_do_not_compare() {
        let text = Value::from("north");
        assert_eq!(text.compare(ComparisonOperator::Equal, &Value::Integer(1)), None);
        assert_eq!(
            text.compare(ComparisonOperator::Equal, &Value::from("north")),
            Some(true)
        );
    }

    #[test]
    fn untagged_deserialization_picks_the_narrowest_kind() {
        let values: Vec<Value> = serde_json::from_str(r#"[true, 3, 2.5, "x"]"#).unwrap_or_default();
        assert_eq!(
            values,
            vec![
                Value::Boolean(true),
                Value::Integer(3),
                Value::Number(2.5),
                Value::from("x"),
            ]
        );
    }
}
