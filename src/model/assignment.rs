//! Assignment result payloads.
//!
//! The scored partition handed back to the caller. Result maps use ordered
//! keys so serialized payloads are deterministic and auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::student::Student;

/// Per-class statistics of a finished assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatistics {
    /// Total students placed.
    pub total_students: usize,
    /// Class size per class index (every class present, empty classes at 0).
    pub class_sizes: BTreeMap<u32, usize>,
    /// Per-class gender counts, keyed by the labels the cohort uses.
    pub gender_distribution: BTreeMap<u32, BTreeMap<String, usize>>,
    /// Per-class mean of the highest-priority numeric balance field.
    /// Absent when no active balance rule targets a numeric field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_scores: Option<BTreeMap<u32, f64>>,
}

/// A scored assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Storage identifier, assigned by the persistence layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub school_id: i64,
    pub name: String,
    pub grade: i32,
    pub year: i32,
    pub num_classes: u32,
    /// Weighted aggregate score in [0, 100], rounded to 2 decimals.
    pub total_score: f64,
    /// Score per active soft rule, keyed by rule name.
    pub rule_scores: BTreeMap<String, f64>,
    pub statistics: AssignmentStatistics,
    /// When the run completed.
    pub created_at: DateTime<Utc>,
}

/// An assignment together with the per-class student rosters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDetail {
    pub assignment: Assignment,
    /// Students of each class, keyed by 0-based class index.
    pub classes: BTreeMap<u32, Vec<Student>>,
}
