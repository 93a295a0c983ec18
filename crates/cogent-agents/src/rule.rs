//! Rules (decision options): AND-combined antecedent parts and one consequent.
//!
//! Rule equality is structural. Two rules are equal when their antecedent
//! lists and consequents are equal, regardless of id, flags or layer. This is
//! what lets innovation detect that a freshly generated rule already exists.

use cogent_types::{ComparisonOperator, RuleId, Value};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::variables::{self, PREVIOUS_PREFIX, Variables};

// ---------------------------------------------------------------------------
// Antecedent
// ---------------------------------------------------------------------------

/// One condition of a rule: `variable <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntecedentPart {
    /// Agent variable tested by the condition.
    pub variable: String,
    /// Comparison operator.
    pub operator: ComparisonOperator,
    /// Constant right-hand side.
    pub value: Value,
    /// Variable read live as the right-hand side instead of `value`.
    #[serde(default)]
    pub reference: Option<String>,
}

impl AntecedentPart {
    /// Create a condition against a constant.
    pub fn new(variable: impl Into<String>, operator: ComparisonOperator, value: impl Into<Value>) -> Self {
        Self {
            variable: variable.into(),
            operator,
            value: value.into(),
            reference: None,
        }
    }

    /// Evaluate the condition against an agent's variable overlay.
    pub fn evaluate(&self, private: &Variables, shared: &Variables) -> Result<bool, AgentError> {
        let left = variables::lookup(private, shared, &self.variable)?;
        let right = match &self.reference {
            Some(reference) => variables::lookup(private, shared, reference)?,
            None => &self.value,
        };
        left.compare(self.operator, right)
            .ok_or_else(|| AgentError::TypeMismatch {
                variable: self.variable.clone(),
                operator: self.operator,
                left: left.kind(),
                right: right.kind(),
            })
    }

    /// Clone the condition with a new constant, dropping any live reference.
    #[must_use]
    pub fn renew(&self, value: Value) -> Self {
        Self {
            variable: self.variable.clone(),
            operator: self.operator,
            value,
            reference: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Consequent
// ---------------------------------------------------------------------------

/// The effect of a rule: write a value into an agent variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consequent {
    /// Variable written when the rule is applied.
    pub variable: String,
    /// Constant value written.
    pub value: Value,
    /// Variable whose live value is written instead of `value`.
    #[serde(default)]
    pub reference: Option<String>,
    /// Also write the value into the archetype's shared store.
    #[serde(default)]
    pub copy_to_shared: bool,
    /// Save the variable's old value as `Previous<variable>` before writing.
    #[serde(default)]
    pub save_previous: bool,
}

/// A consequent write that actually happened.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedConsequent {
    /// The variable written.
    pub variable: String,
    /// The value written.
    pub value: Value,
}

impl Consequent {
    /// Create a consequent writing a constant.
    pub fn new(variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            variable: variable.into(),
            value: value.into(),
            reference: None,
            copy_to_shared: false,
            save_previous: false,
        }
    }

    /// The consequent carried by synthesized do-nothing rules.
    pub fn nothing() -> Self {
        Self::new(String::new(), Value::Boolean(false))
    }

    /// Resolve the value this consequent would write for an agent.
    pub fn resolve(&self, private: &Variables, shared: &Variables) -> Result<Value, AgentError> {
        match &self.reference {
            Some(reference) => variables::lookup(private, shared, reference).cloned(),
            None => Ok(self.value.clone()),
        }
    }

    /// Numeric view of the value this consequent would write.
    pub fn resolve_number(&self, private: &Variables, shared: &Variables) -> Result<f64, AgentError> {
        let value = self.resolve(private, shared)?;
        value.as_f64().ok_or_else(|| AgentError::NotNumeric {
            name: self.variable.clone(),
            found: value.kind(),
        })
    }

    /// Write the consequent into the agent's variable overlay.
    pub fn apply(
        &self,
        private: &mut Variables,
        shared: &mut Variables,
    ) -> Result<AppliedConsequent, AgentError> {
        let value = self.resolve(private, shared)?;
        if self.save_previous {
            if let Ok(old) = variables::lookup(private, shared, &self.variable).cloned() {
                let key = format!("{PREVIOUS_PREFIX}{}", self.variable);
                variables::store(private, shared, &key, old);
            }
        }
        variables::store(private, shared, &self.variable, value.clone());
        if self.copy_to_shared {
            shared.set(self.variable.clone(), value.clone());
        }
        Ok(AppliedConsequent {
            variable: self.variable.clone(),
            value,
        })
    }

    /// Clone the consequent with a new constant, dropping any live reference.
    #[must_use]
    pub fn renew(&self, value: Value) -> Self {
        Self {
            variable: self.variable.clone(),
            value,
            reference: None,
            copy_to_shared: self.copy_to_shared,
            save_previous: self.save_previous,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A decision option living in exactly one rule layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Position-derived id; also names the owning layer.
    pub id: RuleId,
    /// AND-combined conditions. Empty means "always matches".
    pub antecedent: Vec<AntecedentPart>,
    /// The rule's effect.
    pub consequent: Consequent,
    /// False only for the synthesized do-nothing rule.
    pub is_action: bool,
    /// Whether activation needs a quorum of same-household peers.
    pub is_collective_action: bool,
    /// Quorum size, counting the activating agent.
    pub required_participants: u32,
    /// Whether innovation may derive new rules from this one.
    pub is_modifiable: bool,
    /// Whether the rule was produced by innovation.
    pub auto_generated: bool,
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.antecedent == other.antecedent && self.consequent == other.consequent
    }
}

impl Rule {
    /// The synthesized non-action rule of a layer.
    pub fn do_nothing(id: RuleId) -> Self {
        Self {
            id,
            antecedent: Vec::new(),
            consequent: Consequent::nothing(),
            is_action: false,
            is_collective_action: false,
            required_participants: 1,
            is_modifiable: false,
            auto_generated: false,
        }
    }

    /// Whether every antecedent part holds for the agent.
    pub fn matches(&self, private: &Variables, shared: &Variables) -> Result<bool, AgentError> {
        for part in &self.antecedent {
            if !part.evaluate(private, shared)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Variables applying this rule writes to, in write order.
    pub fn written_variables(&self) -> Vec<String> {
        if !self.is_action {
            return Vec::new();
        }
        let variable = &self.consequent.variable;
        if self.consequent.save_previous {
            vec![format!("{PREVIOUS_PREFIX}{variable}"), variable.clone()]
        } else {
            vec![variable.clone()]
        }
    }

    /// Apply the consequent. Non-action rules write nothing and return `None`.
    pub fn apply(
        &self,
        private: &mut Variables,
        shared: &mut Variables,
    ) -> Result<Option<AppliedConsequent>, AgentError> {
        if !self.is_action {
            return Ok(None);
        }
        self.consequent.apply(private, shared).map(Some)
    }

    /// Derive an auto-generated rule with new conditions and effect.
    ///
    /// The id is a placeholder until the owning layer assigns one.
    #[must_use]
    pub fn renew(&self, antecedent: Vec<AntecedentPart>, consequent: Consequent) -> Self {
        Self {
            id: self.id,
            antecedent,
            consequent,
            is_action: self.is_action,
            is_collective_action: self.is_collective_action,
            required_participants: self.required_participants,
            is_modifiable: self.is_modifiable,
            auto_generated: true,
        }
    }
}

/// A rule as written in an archetype definition, before ids are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// 1-based rule set position.
    pub set: u16,
    /// 1-based layer position within the set.
    pub layer: u16,
    /// Conditions.
    #[serde(default)]
    pub antecedent: Vec<AntecedentPart>,
    /// Effect.
    pub consequent: Consequent,
    /// Quorum size for collective actions; absent for individual actions.
    #[serde(default)]
    pub required_participants: Option<u32>,
    /// Whether innovation may derive new rules from this one.
    #[serde(default)]
    pub is_modifiable: bool,
}

impl RuleDefinition {
    /// Build the rule with the id its layer assigned.
    pub fn into_rule(self, id: RuleId) -> Rule {
        let required = self.required_participants.unwrap_or(1).max(1);
        Rule {
            id,
            antecedent: self.antecedent,
            consequent: self.consequent,
            is_action: true,
            is_collective_action: self.required_participants.is_some(),
            required_participants: required,
            is_modifiable: self.is_modifiable,
            auto_generated: false,
        }
    }
}
