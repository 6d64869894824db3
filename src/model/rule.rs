//! Assignment rule model.
//!
//! A rule is a stored record whose `rule_definition` payload selects one of
//! four behaviors: balance and distribution shape the soft score, constraint
//! declares hard pairwise requirements, complex combines field conditions
//! with a placement action. Definitions deserialize from the tagged JSON the
//! administrative layer stores.

use serde::{Deserialize, Serialize};

use super::student::{FieldValue, Student};

/// The declared rule category. Must agree with the definition variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Balance,
    Constraint,
    Distribution,
    Complex,
}

/// What a balance rule balances toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceTarget {
    /// Equalize counts (categorical fields) or means (numeric fields)
    /// across classes.
    Equal,
    /// Keep every class mean close to the cohort-wide mean.
    Average,
}

/// Hard pairwise requirement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    /// Listed students must never share a class.
    Separate,
    /// Listed students must always share a class.
    Together,
}

/// How a distribution rule scores the placement of matched students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionStrategy {
    /// Reward spreading matched students evenly across classes.
    Spread,
    /// Penalize classes holding more than `max_per_class` matched students.
    Limit,
}

/// What a complex rule does with its matched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexAction {
    /// Co-locating matched students raises the score.
    Reward,
    /// Co-locating matched students lowers the score.
    Penalize,
}

/// Comparison operator inside a complex-rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOp {
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "in")]
    In,
}

/// One field condition of a complex rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOp,
    pub value: FieldValue,
}

impl Condition {
    /// Creates a condition.
    pub fn new(field: impl Into<String>, operator: ConditionOp, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Whether this condition holds for the student.
    ///
    /// The `gender` field name reads the dedicated gender field; every other
    /// name reads `custom_fields`. A missing field fails every operator
    /// except `!=`, which it satisfies. Ordered comparisons require numeric
    /// values on both sides; `in` requires a list value on the rule side.
    pub fn matches(&self, student: &Student) -> bool {
        if self.field == "gender" {
            let g = student.gender.as_str();
            return match self.operator {
                ConditionOp::Eq => self.value.as_text() == Some(g),
                ConditionOp::Ne => self.value.as_text() != Some(g),
                ConditionOp::In => match &self.value {
                    FieldValue::List(items) => items.iter().any(|v| v.as_text() == Some(g)),
                    _ => false,
                },
                _ => false,
            };
        }

        let actual = match student.custom_fields.get(&self.field) {
            Some(v) => v,
            None => return self.operator == ConditionOp::Ne,
        };
        match self.operator {
            ConditionOp::Eq => actual == &self.value,
            ConditionOp::Ne => actual != &self.value,
            ConditionOp::Gt | ConditionOp::Ge | ConditionOp::Lt | ConditionOp::Le => {
                match (actual.as_number(), self.value.as_number()) {
                    (Some(a), Some(b)) => match self.operator {
                        ConditionOp::Gt => a > b,
                        ConditionOp::Ge => a >= b,
                        ConditionOp::Lt => a < b,
                        ConditionOp::Le => a <= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
            ConditionOp::In => match &self.value {
                FieldValue::List(items) => items.iter().any(|v| v == actual),
                _ => false,
            },
        }
    }
}

/// The executable payload of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleDefinition {
    /// Balance a field across classes within a tolerance.
    Balance {
        field: String,
        target: BalanceTarget,
        tolerance: f64,
    },
    /// Hard pairwise requirement over the listed students.
    Constraint {
        constraint_type: ConstraintKind,
        student_ids: Vec<i64>,
    },
    /// Shape where students matching a field criterion end up.
    /// With neither `value` nor `range`, truthy field values match.
    Distribution {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<FieldValue>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<(f64, f64)>,
        strategy: DistributionStrategy,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_per_class: Option<u32>,
    },
    /// Conditions select a student set; the action scores its placement.
    Complex {
        conditions: Vec<Condition>,
        action: ComplexAction,
    },
}

impl RuleDefinition {
    /// Creates a balance definition.
    pub fn balance(field: impl Into<String>, target: BalanceTarget, tolerance: f64) -> Self {
        Self::Balance {
            field: field.into(),
            target,
            tolerance,
        }
    }

    /// Creates a must-separate constraint over the listed students.
    pub fn separate(student_ids: Vec<i64>) -> Self {
        Self::Constraint {
            constraint_type: ConstraintKind::Separate,
            student_ids,
        }
    }

    /// Creates a must-together constraint over the listed students.
    pub fn together(student_ids: Vec<i64>) -> Self {
        Self::Constraint {
            constraint_type: ConstraintKind::Together,
            student_ids,
        }
    }

    /// Creates a spread distribution over truthy values of a field.
    pub fn spread(field: impl Into<String>) -> Self {
        Self::Distribution {
            field: field.into(),
            value: None,
            range: None,
            strategy: DistributionStrategy::Spread,
            max_per_class: None,
        }
    }

    /// Creates a limit distribution over truthy values of a field.
    pub fn limit(field: impl Into<String>, max_per_class: u32) -> Self {
        Self::Distribution {
            field: field.into(),
            value: None,
            range: None,
            strategy: DistributionStrategy::Limit,
            max_per_class: Some(max_per_class),
        }
    }

    /// Creates a complex definition.
    pub fn complex(conditions: Vec<Condition>, action: ComplexAction) -> Self {
        Self::Complex { conditions, action }
    }

    /// The rule category this definition belongs to.
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleDefinition::Balance { .. } => RuleType::Balance,
            RuleDefinition::Constraint { .. } => RuleType::Constraint,
            RuleDefinition::Distribution { .. } => RuleType::Distribution,
            RuleDefinition::Complex { .. } => RuleType::Complex,
        }
    }
}

/// A stored assignment rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule identifier.
    pub id: i64,
    /// Owning school.
    pub school_id: i64,
    /// Display name, also the key in per-rule score reports.
    pub name: String,
    /// Optional operator-facing description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared category; must agree with the definition variant.
    pub rule_type: RuleType,
    /// Importance for ordering, 1 (lowest) to 10 (highest).
    pub priority: i32,
    /// Soft-score weight, non-negative.
    pub weight: f64,
    /// Inactive rules are ignored entirely.
    pub is_active: bool,
    /// The executable payload.
    #[serde(rename = "rule_definition")]
    pub definition: RuleDefinition,
}

impl Rule {
    /// Creates an active rule with priority 5 and weight 1.0. The declared
    /// type is derived from the definition.
    pub fn new(id: i64, name: impl Into<String>, definition: RuleDefinition) -> Self {
        Self {
            id,
            school_id: 0,
            name: name.into(),
            description: None,
            rule_type: definition.rule_type(),
            priority: 5,
            weight: 1.0,
            is_active: true,
            definition,
        }
    }

    /// Sets the owning school.
    pub fn with_school(mut self, school_id: i64) -> Self {
        self.school_id = school_id;
        self
    }

    /// Sets the priority (1 to 10).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the soft-score weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Marks the rule active or inactive.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}
