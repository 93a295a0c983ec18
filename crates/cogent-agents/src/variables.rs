//! Named variable stores with a private-over-shared overlay.
//!
//! Each archetype owns a shared ("common") [`Variables`] store and each
//! agent owns a private one. Reads consult the private store first and fall
//! through to the shared store; a name present in neither is an
//! [`AgentError::UnknownVariable`]. Writes go to whichever store already
//! holds the name, preferring the private one, and otherwise create a new
//! private entry.

use std::collections::BTreeMap;

use cogent_types::Value;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Prefix of the variable a retain-previous consequent writes the old
/// value to, e.g. `PreviousHarvest` for `Harvest`.
pub const PREVIOUS_PREFIX: &str = "Previous";

/// Well-known variable holding an agent's household label.
pub const HOUSEHOLD_VARIABLE: &str = "Household";

/// A flat mapping from variable name to typed value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, Value>);

impl Variables {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Look up a variable in this store only.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Insert or overwrite a variable in this store.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Whether this store holds the variable.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Remove a variable from this store, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Number of variables held.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for Variables {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Read a variable through the overlay: private first, then shared.
pub fn lookup<'a>(
    private: &'a Variables,
    shared: &'a Variables,
    name: &str,
) -> Result<&'a Value, AgentError> {
    private
        .get(name)
        .or_else(|| shared.get(name))
        .ok_or_else(|| AgentError::UnknownVariable {
            name: String::from(name),
        })
}

/// Read a numeric variable through the overlay.
pub fn lookup_number(
    private: &Variables,
    shared: &Variables,
    name: &str,
) -> Result<f64, AgentError> {
    let value = lookup(private, shared, name)?;
    value.as_f64().ok_or_else(|| AgentError::NotNumeric {
        name: String::from(name),
        found: value.kind(),
    })
}

/// Write a variable through the overlay.
///
/// The private store wins if it already holds the name; otherwise an
/// existing shared entry is updated; otherwise a new private entry is made.
pub fn store(private: &mut Variables, shared: &mut Variables, name: &str, value: Value) {
    if !private.contains(name) && shared.contains(name) {
        shared.set(name, value);
    } else {
        private.set(name, value);
    }
}

/// What each store holds for one variable name at one moment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    /// Entry in the agent's private store.
    pub private: Option<Value>,
    /// Entry in the archetype's shared store.
    pub shared: Option<Value>,
}

impl StoredValue {
    /// Capture both stores' entries for `name`.
    pub fn read(private: &Variables, shared: &Variables, name: &str) -> Self {
        Self {
            private: private.get(name).cloned(),
            shared: shared.get(name).cloned(),
        }
    }
}

/// Put `before` back for `name` in each store still holding `after`.
///
/// A store someone else wrote since `after` was captured keeps its value.
pub fn revert(
    private: &mut Variables,
    shared: &mut Variables,
    name: &str,
    before: &StoredValue,
    after: &StoredValue,
) {
    if private.get(name) == after.private.as_ref() {
        put(private, name, before.private.clone());
    }
    if shared.get(name) == after.shared.as_ref() {
        put(shared, name, before.shared.clone());
    }
}

fn put(store: &mut Variables, name: &str, value: Option<Value>) {
    match value {
        Some(value) => store.set(name, value),
        None => {
            store.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> (Variables, Variables) {
        let mut private = Variables::new();
        private.set("Income", 10_i64);
        let mut shared = Variables::new();
        shared.set("Income", 99_i64);
        shared.set("Price", 2.5);
        (private, shared)
    }

    #[test]
    fn private_value_shadows_shared() {
        let (private, shared) = stores();
        assert_eq!(lookup(&private, &shared, "Income").ok(), Some(&Value::Integer(10)));
        assert_eq!(lookup_number(&private, &shared, "Price").ok(), Some(2.5));
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let (private, shared) = stores();
        let err = lookup(&private, &shared, "Rainfall");
        assert!(matches!(err, Err(AgentError::UnknownVariable { name }) if name == "Rainfall"));
    }

    #[test]
    fn non_numeric_lookup_reports_kind() {
        let (mut private, shared) = stores();
        private.set("Site", "north");
        let err = lookup_number(&private, &shared, "Site");
        assert!(matches!(err, Err(AgentError::NotNumeric { .. })));
    }

    #[test]
    fn writes_follow_the_overlay() {
        let (mut private, mut shared) = stores();
        store(&mut private, &mut shared, "Income", Value::Integer(11));
        store(&mut private, &mut shared, "Price", Value::Number(3.0));
        store(&mut private, &mut shared, "Effort", Value::Number(0.5));

        assert_eq!(private.get("Income"), Some(&Value::Integer(11)));
        assert_eq!(shared.get("Income"), Some(&Value::Integer(99)));
        assert_eq!(shared.get("Price"), Some(&Value::Number(3.0)));
        assert!(!private.contains("Price"));
        assert_eq!(private.get("Effort"), Some(&Value::Number(0.5)));
    }

    #[test]
    fn revert_restores_untouched_stores_only() {
        let (mut private, mut shared) = stores();
        let before = StoredValue::read(&private, &shared, "Price");
        private.set("Price", 3.0);
        shared.set("Price", 4.0);
        let after = StoredValue::read(&private, &shared, "Price");
        // Another writer changes the shared entry in between.
        shared.set("Price", 5.0);

        revert(&mut private, &mut shared, "Price", &before, &after);
        assert!(!private.contains("Price"));
        assert_eq!(shared.get("Price"), Some(&Value::Number(5.0)));
    }
}
