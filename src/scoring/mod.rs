//! Soft-objective scoring.
//!
//! Each active balance, distribution, and complex rule compiles into one
//! scorer producing a value in [0, 100] for a candidate partition. The
//! aggregate is the weighted average over all scorers, so `total_score`
//! stays in [0, 100] regardless of rule count and weights. Scoring is pure:
//! the same partition and rule set always produces identical output.

mod scorers;

pub use scorers::{BalanceScorer, ComplexScorer, DistributionScorer, FieldMatcher, MatchCriteria};

use std::collections::BTreeMap;

use crate::cohort::{Cohort, Partition};

/// A soft objective over candidate partitions.
///
/// Scores are in [0, 100], higher is better. Implementations must be pure
/// and cheap: strategies call them inside their inner loops, and parallel
/// fitness evaluation shares them across threads. Units the partition has
/// not placed yet are skipped, which makes partial partitions score their
/// placed subset (greedy's marginal evaluation relies on this).
pub trait Scorer: Send + Sync {
    fn score(&self, cohort: &Cohort, partition: &Partition) -> f64;
}

/// A scorer with the name and weight of the rule it came from.
pub struct CompiledScorer {
    name: String,
    weight: f64,
    scorer: Box<dyn Scorer>,
}

impl CompiledScorer {
    pub fn new(name: impl Into<String>, weight: f64, scorer: Box<dyn Scorer>) -> Self {
        Self {
            name: name.into(),
            weight,
            scorer,
        }
    }

    /// The owning rule's display name, the key in per-rule reports.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn score(&self, cohort: &Cohort, partition: &Partition) -> f64 {
        self.scorer.score(cohort, partition)
    }
}

impl std::fmt::Debug for CompiledScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledScorer")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish()
    }
}

/// Scores of one candidate partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Weighted average over all scorers, in [0, 100].
    pub total: f64,
    /// Score per rule, keyed by rule name.
    pub per_rule: BTreeMap<String, f64>,
}

/// Weighted-average total without the per-rule map. The fast path for
/// search inner loops.
pub fn total_score(cohort: &Cohort, partition: &Partition, scorers: &[CompiledScorer]) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for scorer in scorers {
        weighted_sum += scorer.weight() * scorer.score(cohort, partition);
        weight_total += scorer.weight();
    }
    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    }
}

/// Full evaluation with the per-rule breakdown.
pub fn evaluate(cohort: &Cohort, partition: &Partition, scorers: &[CompiledScorer]) -> Evaluation {
    let mut per_rule = BTreeMap::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for scorer in scorers {
        let score = scorer.score(cohort, partition);
        per_rule.insert(scorer.name().to_string(), score);
        weighted_sum += scorer.weight() * score;
        weight_total += scorer.weight();
    }
    let total = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        0.0
    };
    Evaluation { total, per_rule }
}

/// Iterates `(student_index, class)` over students whose unit is placed.
pub(crate) fn assigned_students<'c>(
    cohort: &'c Cohort,
    partition: &'c Partition,
) -> impl Iterator<Item = (usize, u32)> + 'c {
    (0..cohort.student_count()).filter_map(move |idx| {
        let class = partition.class_of(cohort.unit_of(idx));
        (class != Partition::UNASSIGNED).then_some((idx, class))
    })
}
