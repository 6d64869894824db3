//! Result assembly.
//!
//! Turns the winning partition into the stored artifact: per-class
//! rosters sorted by student id, rounded scores, and the headline
//! statistics a homeroom planner checks first (sizes, gender mix, class
//! means of the leading numeric balance field). Pure aside from the
//! completion timestamp, which the caller supplies.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::cohort::{Cohort, Partition};
use crate::compile::CompiledRules;
use crate::model::{
    Assignment, AssignmentDetail, AssignmentRequest, AssignmentStatistics, Student,
};
use crate::scoring::evaluate;

/// Two decimal places, enough for display and stable across storage.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The scored assignment payload for a winning partition.
pub fn assemble(
    request: &AssignmentRequest,
    cohort: &Cohort,
    partition: &Partition,
    compiled: &CompiledRules,
    created_at: DateTime<Utc>,
) -> Assignment {
    let classes = class_rosters(request.num_classes, cohort, partition);
    build_assignment(request, cohort, partition, &classes, compiled, created_at)
}

/// The payload together with the per-class rosters.
pub fn assemble_detail(
    request: &AssignmentRequest,
    cohort: &Cohort,
    partition: &Partition,
    compiled: &CompiledRules,
    created_at: DateTime<Utc>,
) -> AssignmentDetail {
    let classes = class_rosters(request.num_classes, cohort, partition);
    let assignment =
        build_assignment(request, cohort, partition, &classes, compiled, created_at);
    AssignmentDetail { assignment, classes }
}

/// Expands units to students and groups them per class, every class
/// keyed even when empty, rosters sorted by student id.
fn class_rosters(
    num_classes: u32,
    cohort: &Cohort,
    partition: &Partition,
) -> BTreeMap<u32, Vec<Student>> {
    let class_of = cohort.expand(partition);
    let mut classes: BTreeMap<u32, Vec<Student>> =
        (0..num_classes).map(|class| (class, Vec::new())).collect();
    for (idx, student) in cohort.students().iter().enumerate() {
        if let Some(roster) = classes.get_mut(&class_of[idx]) {
            roster.push(student.clone());
        }
    }
    for roster in classes.values_mut() {
        roster.sort_by_key(|student| student.id);
    }
    classes
}

fn build_assignment(
    request: &AssignmentRequest,
    cohort: &Cohort,
    partition: &Partition,
    classes: &BTreeMap<u32, Vec<Student>>,
    compiled: &CompiledRules,
    created_at: DateTime<Utc>,
) -> Assignment {
    let evaluation = evaluate(cohort, partition, &compiled.scorers);
    let rule_scores = evaluation
        .per_rule
        .iter()
        .map(|(name, score)| (name.clone(), round2(*score)))
        .collect();

    Assignment {
        id: None,
        school_id: request.school_id,
        name: request.name.clone(),
        grade: request.grade,
        year: request.year,
        num_classes: request.num_classes,
        total_score: round2(evaluation.total),
        rule_scores,
        statistics: build_statistics(cohort, classes, &compiled.balance_fields),
        created_at,
    }
}

fn build_statistics(
    cohort: &Cohort,
    classes: &BTreeMap<u32, Vec<Student>>,
    balance_fields: &[String],
) -> AssignmentStatistics {
    let class_sizes = classes
        .iter()
        .map(|(class, roster)| (*class, roster.len()))
        .collect();

    // every gender label seen in the cohort appears in every class
    let genders: BTreeSet<&str> = cohort.students().iter().map(|s| s.gender.as_str()).collect();
    let gender_distribution = classes
        .iter()
        .map(|(class, roster)| {
            let mut counts: BTreeMap<String, usize> =
                genders.iter().map(|g| (g.to_string(), 0)).collect();
            for student in roster {
                *counts.entry(student.gender.clone()).or_insert(0) += 1;
            }
            (*class, counts)
        })
        .collect();

    // class means of the leading balance field that actually has numbers
    let average_scores = balance_fields
        .iter()
        .find(|field| {
            cohort
                .students()
                .iter()
                .any(|s| s.numeric_field(field).is_some())
        })
        .map(|field| {
            classes
                .iter()
                .map(|(class, roster)| {
                    let values: Vec<f64> =
                        roster.iter().filter_map(|s| s.numeric_field(field)).collect();
                    let mean = if values.is_empty() {
                        0.0
                    } else {
                        values.iter().sum::<f64>() / values.len() as f64
                    };
                    (*class, round2(mean))
                })
                .collect()
        });

    AssignmentStatistics {
        total_students: cohort.student_count(),
        class_sizes,
        gender_distribution,
        average_scores,
    }
}
