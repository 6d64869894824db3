//! The three soft scorer kinds: balance, distribution, complex.
//!
//! All scorers share one shape: aggregate the placed students per class,
//! reduce to a deviation or fraction, map into [0, 100]. Balance uses a
//! linear tolerance ramp, spread uses normalized entropy, limit and complex
//! use proportional fractions.
//!
//! # Reference
//! Shannon (1948), "A Mathematical Theory of Communication" (entropy spread)

use std::collections::BTreeMap;

use crate::cohort::{Cohort, Partition};
use crate::model::{
    BalanceTarget, ComplexAction, Condition, DistributionStrategy, FieldValue, Student,
};

use super::{assigned_students, Scorer};

/// Linear tolerance ramp: deviation 0 scores 100, deviation at or beyond
/// the tolerance scores 0. A zero tolerance accepts exact balance only.
fn tolerance_ramp(deviation: f64, tolerance: f64) -> f64 {
    if deviation <= 0.0 {
        100.0
    } else if tolerance <= 0.0 || deviation >= tolerance {
        0.0
    } else {
        100.0 * (1.0 - deviation / tolerance)
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

// ==================== Balance ====================

/// Balances a field across classes within a tolerance.
///
/// The field is numeric when any student carries a number under it
/// (`gender` is always categorical). Deviation units follow the data:
/// counts for categorical equal-targets, field units for numeric targets,
/// percentage points for categorical average-targets. The tolerance is
/// expressed in the same unit.
pub struct BalanceScorer {
    field: String,
    target: BalanceTarget,
    tolerance: f64,
}

impl BalanceScorer {
    pub fn new(field: impl Into<String>, target: BalanceTarget, tolerance: f64) -> Self {
        Self {
            field: field.into(),
            target,
            tolerance,
        }
    }

    fn is_numeric(&self, cohort: &Cohort) -> bool {
        self.field != "gender"
            && cohort
                .students()
                .iter()
                .any(|s| s.numeric_field(&self.field).is_some())
    }

    fn numeric_deviation(&self, cohort: &Cohort, partition: &Partition) -> f64 {
        let classes = partition.num_classes() as usize;
        let mut sums = vec![0.0; classes];
        let mut counts = vec![0usize; classes];
        for (idx, class) in assigned_students(cohort, partition) {
            if let Some(v) = cohort.students()[idx].numeric_field(&self.field) {
                sums[class as usize] += v;
                counts[class as usize] += 1;
            }
        }
        // classes with no sampled value cannot deviate
        let means: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .filter(|&(_, &count)| count > 0)
            .map(|(&sum, &count)| sum / count as f64)
            .collect();

        match self.target {
            BalanceTarget::Equal => population_std(&means),
            BalanceTarget::Average => {
                let all: Vec<f64> = cohort
                    .students()
                    .iter()
                    .filter_map(|s| s.numeric_field(&self.field))
                    .collect();
                if all.is_empty() || means.is_empty() {
                    return 0.0;
                }
                let global = all.iter().sum::<f64>() / all.len() as f64;
                means.iter().map(|m| (m - global).abs()).fold(0.0, f64::max)
            }
        }
    }

    fn categorical_key<'s>(&self, student: &'s Student) -> Option<&'s str> {
        if self.field == "gender" {
            return Some(student.gender.as_str());
        }
        match student.custom_fields.get(&self.field) {
            Some(FieldValue::Text(t)) => Some(t.as_str()),
            Some(FieldValue::Bool(true)) => Some("true"),
            Some(FieldValue::Bool(false)) => Some("false"),
            _ => None,
        }
    }

    fn categorical_deviation(&self, cohort: &Cohort, partition: &Partition) -> f64 {
        let classes = partition.num_classes() as usize;

        // value universe from the full cohort, so partial partitions see a
        // stable set of keys
        let mut counts: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for student in cohort.students() {
            if let Some(key) = self.categorical_key(student) {
                counts.entry(key).or_insert_with(|| vec![0; classes]);
            }
        }

        let mut class_totals = vec![0usize; classes];
        let mut assigned_total = 0usize;
        for (idx, class) in assigned_students(cohort, partition) {
            if let Some(key) = self.categorical_key(&cohort.students()[idx]) {
                counts.get_mut(key).expect("key seen in universe pass")[class as usize] += 1;
                class_totals[class as usize] += 1;
                assigned_total += 1;
            }
        }

        match self.target {
            BalanceTarget::Equal => counts
                .values()
                .map(|per_class| {
                    let as_floats: Vec<f64> = per_class.iter().map(|&c| c as f64).collect();
                    population_std(&as_floats)
                })
                .fold(0.0, f64::max),
            BalanceTarget::Average => {
                if assigned_total == 0 {
                    return 0.0;
                }
                let mut max_dev = 0.0f64;
                for per_class in counts.values() {
                    let value_total: usize = per_class.iter().sum();
                    let global_share = value_total as f64 / assigned_total as f64;
                    for (class, &count) in per_class.iter().enumerate() {
                        if class_totals[class] == 0 {
                            continue;
                        }
                        let share = count as f64 / class_totals[class] as f64;
                        max_dev = max_dev.max((share - global_share).abs() * 100.0);
                    }
                }
                max_dev
            }
        }
    }
}

impl Scorer for BalanceScorer {
    fn score(&self, cohort: &Cohort, partition: &Partition) -> f64 {
        let deviation = if self.is_numeric(cohort) {
            self.numeric_deviation(cohort, partition)
        } else {
            self.categorical_deviation(cohort, partition)
        };
        tolerance_ramp(deviation, self.tolerance)
    }
}

// ==================== Distribution ====================

/// Which students a distribution rule counts.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchCriteria {
    /// Field value equals this value.
    Equals(FieldValue),
    /// Numeric field value inside this inclusive interval.
    Range(f64, f64),
    /// Field value is truthy (the flagged-attribute default).
    Truthy,
}

/// Matches students by one field criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatcher {
    field: String,
    criteria: MatchCriteria,
}

impl FieldMatcher {
    pub fn new(field: impl Into<String>, criteria: MatchCriteria) -> Self {
        Self {
            field: field.into(),
            criteria,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn matches(&self, student: &Student) -> bool {
        if self.field == "gender" {
            return match &self.criteria {
                MatchCriteria::Equals(v) => v.as_text() == Some(student.gender.as_str()),
                MatchCriteria::Range(..) => false,
                MatchCriteria::Truthy => !student.gender.is_empty(),
            };
        }
        match (student.custom_fields.get(&self.field), &self.criteria) {
            (None, _) => false,
            (Some(actual), MatchCriteria::Equals(expected)) => actual == expected,
            (Some(actual), MatchCriteria::Range(lo, hi)) => actual
                .as_number()
                .is_some_and(|n| *lo <= n && n <= *hi),
            (Some(actual), MatchCriteria::Truthy) => actual.is_truthy(),
        }
    }
}

/// Shapes where matched students end up: spread evenly, or capped per class.
pub struct DistributionScorer {
    matcher: FieldMatcher,
    strategy: DistributionStrategy,
    max_per_class: Option<u32>,
}

impl DistributionScorer {
    pub fn new(
        matcher: FieldMatcher,
        strategy: DistributionStrategy,
        max_per_class: Option<u32>,
    ) -> Self {
        Self {
            matcher,
            strategy,
            max_per_class,
        }
    }
}

impl Scorer for DistributionScorer {
    fn score(&self, cohort: &Cohort, partition: &Partition) -> f64 {
        let classes = partition.num_classes() as usize;
        let mut matched = vec![0usize; classes];
        let mut total = 0usize;
        for (idx, class) in assigned_students(cohort, partition) {
            if self.matcher.matches(&cohort.students()[idx]) {
                matched[class as usize] += 1;
                total += 1;
            }
        }
        match self.strategy {
            DistributionStrategy::Spread => spread_score(&matched, total),
            DistributionStrategy::Limit => limit_score(&matched, total, self.max_per_class),
        }
    }
}

/// Normalized entropy of the matched counts. 100 means as evenly spread as
/// the matched count allows; 0 means fully clustered in one class.
fn spread_score(matched: &[usize], total: usize) -> f64 {
    if total <= 1 || matched.len() <= 1 {
        return 100.0;
    }
    let entropy: f64 = matched
        .iter()
        .filter(|&&m| m > 0)
        .map(|&m| {
            let p = m as f64 / total as f64;
            -p * p.ln()
        })
        .sum();
    let max_entropy = (total.min(matched.len()) as f64).ln();
    if max_entropy <= 0.0 {
        return 100.0;
    }
    (100.0 * entropy / max_entropy).min(100.0)
}

/// Proportional penalty on matched students above the per-class cap.
fn limit_score(matched: &[usize], total: usize, max_per_class: Option<u32>) -> f64 {
    let Some(cap) = max_per_class else {
        return 100.0;
    };
    if total == 0 {
        return 100.0;
    }
    let excess: usize = matched
        .iter()
        .map(|&m| m.saturating_sub(cap as usize))
        .sum();
    (100.0 * (1.0 - excess as f64 / total as f64)).max(0.0)
}

// ==================== Complex ====================

/// Conditions select a student set; the action scores its co-location,
/// measured as the fraction of matched pairs sharing a class.
pub struct ComplexScorer {
    conditions: Vec<Condition>,
    action: ComplexAction,
}

impl ComplexScorer {
    pub fn new(conditions: Vec<Condition>, action: ComplexAction) -> Self {
        Self { conditions, action }
    }
}

impl Scorer for ComplexScorer {
    fn score(&self, cohort: &Cohort, partition: &Partition) -> f64 {
        let classes = partition.num_classes() as usize;
        let mut matched = vec![0usize; classes];
        let mut total = 0usize;
        for (idx, class) in assigned_students(cohort, partition) {
            let student = &cohort.students()[idx];
            if self.conditions.iter().all(|c| c.matches(student)) {
                matched[class as usize] += 1;
                total += 1;
            }
        }
        if total < 2 {
            return 100.0;
        }
        let pairs: usize = matched.iter().map(|&m| m * (m.saturating_sub(1)) / 2).sum();
        let max_pairs = total * (total - 1) / 2;
        let colocated = pairs as f64 / max_pairs as f64;
        match self.action {
            ComplexAction::Reward => 100.0 * colocated,
            ComplexAction::Penalize => 100.0 * (1.0 - colocated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintGraph;
    use crate::model::ConditionOp;

    const EPS: f64 = 1e-9;

    fn cohort_of(students: &[Student]) -> Cohort<'_> {
        let graph = ConstraintGraph::build(students, &[]).unwrap();
        Cohort::collapse(students, &graph)
    }

    fn gendered(genders: &[&str]) -> Vec<Student> {
        genders
            .iter()
            .enumerate()
            .map(|(i, g)| Student::new(i as i64 + 1, format!("s{i}"), *g))
            .collect()
    }

    // ---- tolerance ramp ----

    #[test]
    fn test_tolerance_ramp_shape() {
        assert_eq!(tolerance_ramp(0.0, 2.0), 100.0);
        assert_eq!(tolerance_ramp(2.0, 2.0), 0.0);
        assert_eq!(tolerance_ramp(5.0, 2.0), 0.0);
        assert!((tolerance_ramp(1.0, 2.0) - 50.0).abs() < EPS);
        // zero tolerance accepts exact balance only
        assert_eq!(tolerance_ramp(0.0, 0.0), 100.0);
        assert_eq!(tolerance_ramp(0.1, 0.0), 0.0);
    }

    // ---- balance ----

    #[test]
    fn test_balance_gender_perfect_split() {
        let students = gendered(&["남", "남", "여", "여"]);
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 1, 0, 1], 2);
        let scorer = BalanceScorer::new("gender", BalanceTarget::Equal, 1.0);
        assert!((scorer.score(&cohort, &partition) - 100.0).abs() < EPS);
    }

    #[test]
    fn test_balance_gender_worst_split() {
        let students = gendered(&["남", "남", "여", "여"]);
        let cohort = cohort_of(&students);
        // both males in class 0, both females in class 1
        let partition = Partition::from_classes(vec![0, 0, 1, 1], 2);
        let scorer = BalanceScorer::new("gender", BalanceTarget::Equal, 1.0);
        assert_eq!(scorer.score(&cohort, &partition), 0.0);
    }

    #[test]
    fn test_balance_gender_linear_midpoint() {
        // male counts [3, 1]: deviation 1 count, tolerance 2 -> 50
        let students = gendered(&["남", "남", "남", "남", "여", "여", "여", "여"]);
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 0, 0, 1, 0, 1, 1, 1], 2);
        let scorer = BalanceScorer::new("gender", BalanceTarget::Equal, 2.0);
        assert!((scorer.score(&cohort, &partition) - 50.0).abs() < EPS);
    }

    #[test]
    fn test_balance_numeric_average_target() {
        let students: Vec<Student> = [80.0, 90.0, 80.0, 90.0]
            .iter()
            .enumerate()
            .map(|(i, score)| {
                Student::new(i as i64 + 1, format!("s{i}"), "남").with_field("성적", *score)
            })
            .collect();
        let cohort = cohort_of(&students);
        let scorer = BalanceScorer::new("성적", BalanceTarget::Average, 10.0);

        // means [85, 85] against a global mean of 85
        let partition = Partition::from_classes(vec![0, 1, 1, 0], 2);
        assert!((scorer.score(&cohort, &partition) - 100.0).abs() < EPS);

        // means [80, 90], both 5 away from the global mean
        let partition = Partition::from_classes(vec![0, 1, 0, 1], 2);
        assert!((scorer.score(&cohort, &partition) - 50.0).abs() < EPS);
    }

    #[test]
    fn test_balance_skips_students_missing_the_field() {
        let students = vec![
            Student::new(1, "a", "남").with_field("성적", 90.0),
            Student::new(2, "b", "남").with_field("성적", 90.0),
            Student::new(3, "c", "남"), // no score recorded
        ];
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 1, 1], 2);
        let scorer = BalanceScorer::new("성적", BalanceTarget::Equal, 5.0);
        // means [90, 90]
        assert!((scorer.score(&cohort, &partition) - 100.0).abs() < EPS);
    }

    // ---- field matcher ----

    #[test]
    fn test_matcher_value_and_range() {
        let athletic = Student::new(1, "a", "남").with_field("특기", "운동");
        let musical = Student::new(2, "b", "여").with_field("특기", "음악");
        let matcher = FieldMatcher::new("특기", MatchCriteria::Equals("운동".into()));
        assert!(matcher.matches(&athletic));
        assert!(!matcher.matches(&musical));

        let top = Student::new(3, "c", "남").with_field("성적", 90.0);
        let edge = Student::new(4, "d", "남").with_field("성적", 100.0);
        let below = Student::new(5, "e", "남").with_field("성적", 89.9);
        let matcher = FieldMatcher::new("성적", MatchCriteria::Range(90.0, 100.0));
        assert!(matcher.matches(&top));
        assert!(matcher.matches(&edge));
        assert!(!matcher.matches(&below));
    }

    #[test]
    fn test_matcher_truthy_default() {
        let flagged = Student::new(1, "a", "남").with_field("특별관리", true);
        let unflagged = Student::new(2, "b", "남").with_field("특별관리", false);
        let absent = Student::new(3, "c", "남");
        let matcher = FieldMatcher::new("특별관리", MatchCriteria::Truthy);
        assert!(matcher.matches(&flagged));
        assert!(!matcher.matches(&unflagged));
        assert!(!matcher.matches(&absent));
    }

    // ---- distribution ----

    fn flagged_students(flags: &[bool]) -> Vec<Student> {
        flags
            .iter()
            .enumerate()
            .map(|(i, &f)| {
                let s = Student::new(i as i64 + 1, format!("s{i}"), "남");
                if f {
                    s.with_field("특별관리", true)
                } else {
                    s
                }
            })
            .collect()
    }

    #[test]
    fn test_spread_even_scores_full() {
        let students = flagged_students(&[true, true, true, true]);
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 1, 2, 3], 4);
        let scorer = DistributionScorer::new(
            FieldMatcher::new("특별관리", MatchCriteria::Truthy),
            DistributionStrategy::Spread,
            None,
        );
        assert!((scorer.score(&cohort, &partition) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_spread_clustered_scores_zero() {
        let students = flagged_students(&[true, true, true, false]);
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 0, 0, 1], 2);
        let scorer = DistributionScorer::new(
            FieldMatcher::new("특별관리", MatchCriteria::Truthy),
            DistributionStrategy::Spread,
            None,
        );
        assert_eq!(scorer.score(&cohort, &partition), 0.0);
    }

    #[test]
    fn test_spread_normalizes_by_achievable_entropy() {
        // 2 flagged students in 4 classes: one per class is as spread as
        // it gets, so the score is 100 rather than ln(2)/ln(4)
        let students = flagged_students(&[true, true, false, false]);
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 1, 2, 3], 4);
        let scorer = DistributionScorer::new(
            FieldMatcher::new("특별관리", MatchCriteria::Truthy),
            DistributionStrategy::Spread,
            None,
        );
        assert!((scorer.score(&cohort, &partition) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_limit_penalizes_excess_proportionally() {
        let students = flagged_students(&[true; 5]);
        let cohort = cohort_of(&students);
        let scorer = DistributionScorer::new(
            FieldMatcher::new("특별관리", MatchCriteria::Truthy),
            DistributionStrategy::Limit,
            Some(2),
        );

        // counts [2, 2, 1]: nothing over the cap
        let partition = Partition::from_classes(vec![0, 0, 1, 1, 2], 3);
        assert!((scorer.score(&cohort, &partition) - 100.0).abs() < EPS);

        // counts [3, 2, 0]: one student over, 5 matched -> 80
        let partition = Partition::from_classes(vec![0, 0, 0, 1, 1], 3);
        assert!((scorer.score(&cohort, &partition) - 80.0).abs() < EPS);
    }

    #[test]
    fn test_distribution_vacuous_when_nothing_matches() {
        let students = flagged_students(&[false, false]);
        let cohort = cohort_of(&students);
        let partition = Partition::from_classes(vec![0, 1], 2);
        for strategy in [DistributionStrategy::Spread, DistributionStrategy::Limit] {
            let scorer = DistributionScorer::new(
                FieldMatcher::new("특별관리", MatchCriteria::Truthy),
                strategy,
                Some(1),
            );
            assert_eq!(scorer.score(&cohort, &partition), 100.0);
        }
    }

    // ---- complex ----

    fn scored_students(scores: &[f64]) -> Vec<Student> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                Student::new(i as i64 + 1, format!("s{i}"), "남").with_field("성적", *score)
            })
            .collect()
    }

    #[test]
    fn test_complex_penalize_colocated_pairs() {
        let students = scored_students(&[95.0, 95.0, 95.0, 95.0, 50.0, 50.0]);
        let cohort = cohort_of(&students);
        let conditions = vec![Condition::new("성적", ConditionOp::Ge, 90.0)];
        let scorer = ComplexScorer::new(conditions.clone(), ComplexAction::Penalize);

        // all four matched students in one class: fully co-located
        let partition = Partition::from_classes(vec![0, 0, 0, 0, 1, 1], 2);
        assert_eq!(scorer.score(&cohort, &partition), 0.0);

        // split 2/2: 2 of 6 pairs co-located
        let partition = Partition::from_classes(vec![0, 0, 1, 1, 0, 1], 2);
        let expected = 100.0 * (1.0 - 2.0 / 6.0);
        assert!((scorer.score(&cohort, &partition) - expected).abs() < EPS);

        let reward = ComplexScorer::new(conditions, ComplexAction::Reward);
        let partition = Partition::from_classes(vec![0, 0, 0, 0, 1, 1], 2);
        assert_eq!(reward.score(&cohort, &partition), 100.0);
    }

    #[test]
    fn test_complex_conditions_are_anded() {
        let students = vec![
            Student::new(1, "a", "남").with_field("성적", 95.0).with_field("특기", "운동"),
            Student::new(2, "b", "남").with_field("성적", 95.0),
            Student::new(3, "c", "남").with_field("특기", "운동"),
        ];
        let cohort = cohort_of(&students);
        let scorer = ComplexScorer::new(
            vec![
                Condition::new("성적", ConditionOp::Ge, 90.0),
                Condition::new("특기", ConditionOp::Eq, "운동"),
            ],
            ComplexAction::Penalize,
        );
        // only student 1 matches both conditions: vacuous
        let partition = Partition::from_classes(vec![0, 0, 0], 2);
        assert_eq!(scorer.score(&cohort, &partition), 100.0);
    }
}
