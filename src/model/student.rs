//! Student snapshot model.
//!
//! Students are read-only inputs for one assignment run. Fixed demographics
//! live in dedicated fields; everything school-specific (grades, flags,
//! talents) travels in `custom_fields` as free-form values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A free-form custom field value.
///
/// Mirrors the JSON values a school stores per student: numbers for grades,
/// text for categories, booleans for flags, lists for multi-valued fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric value (integers deserialize here too).
    Number(f64),
    /// Text value.
    Text(String),
    /// Boolean flag.
    Bool(bool),
    /// Multi-valued field (also used as the right-hand side of `in` conditions).
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Numeric view of this value. `None` for non-numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view of this value. `None` for non-text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Truthiness in the flagged-attribute sense: `true`, a non-zero number,
    /// non-empty text, or a non-empty list.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(t) => !t.is_empty(),
            FieldValue::List(items) => !items.is_empty(),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(t: &str) -> Self {
        FieldValue::Text(t.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// An immutable student snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Unique student identifier.
    pub id: i64,
    /// Owning school.
    pub school_id: i64,
    /// Grade level being assigned.
    pub grade: i32,
    /// Previous class number, if known.
    #[serde(default)]
    pub class_number: Option<i32>,
    /// Roster number within the previous class, if known.
    #[serde(default)]
    pub number: Option<i32>,
    /// Student name.
    pub name: String,
    /// Gender label as the school records it.
    pub gender: String,
    /// School-specific fields referenced by rules (scores, flags, talents).
    #[serde(default)]
    pub custom_fields: HashMap<String, FieldValue>,
}

impl Student {
    /// Creates a student with the given id, name, and gender.
    pub fn new(id: i64, name: impl Into<String>, gender: impl Into<String>) -> Self {
        Self {
            id,
            school_id: 0,
            grade: 0,
            class_number: None,
            number: None,
            name: name.into(),
            gender: gender.into(),
            custom_fields: HashMap::new(),
        }
    }

    /// Sets the owning school.
    pub fn with_school(mut self, school_id: i64) -> Self {
        self.school_id = school_id;
        self
    }

    /// Sets the grade level.
    pub fn with_grade(mut self, grade: i32) -> Self {
        self.grade = grade;
        self
    }

    /// Sets the previous class number.
    pub fn with_class_number(mut self, class_number: i32) -> Self {
        self.class_number = Some(class_number);
        self
    }

    /// Sets the roster number.
    pub fn with_number(mut self, number: i32) -> Self {
        self.number = Some(number);
        self
    }

    /// Adds a custom field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.custom_fields.insert(key.into(), value.into());
        self
    }

    /// Numeric value of a custom field, if present and numeric.
    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        self.custom_fields.get(field).and_then(FieldValue::as_number)
    }
}
