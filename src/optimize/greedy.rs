//! Deterministic greedy placement.
//!
//! Units are placed one at a time in a fixed order: units flagged by a
//! distribution rule first, then larger units, then higher flag counts,
//! then ascending index. Each unit goes to the legal class whose marginal
//! total score is highest, breaking ties toward the lighter class and then
//! the lower class index. The result is identical across runs for the same
//! input.

use std::cmp::Reverse;

use crate::cohort::Partition;
use crate::error::{EngineError, EngineResult};

use super::SearchContext;

/// Score difference below which two candidate classes count as tied.
const EPSILON: f64 = 1e-9;

pub(crate) fn greedy_assignment(ctx: &SearchContext) -> EngineResult<Partition> {
    let mut partition = Partition::empty(ctx.cohort.unit_count(), ctx.num_classes);
    let mut sizes = vec![0usize; ctx.num_classes as usize];

    for unit in placement_order(ctx) {
        let Some(class) = best_marginal_class(ctx, &partition, unit, &sizes, None) else {
            return Err(EngineError::NoFeasibleAssignment { iterations: 1 });
        };
        partition.set(unit, class);
        sizes[class as usize] += ctx.cohort.units()[unit].size();
    }
    Ok(partition)
}

/// How many distribution rules flag members of this unit. Flagged units
/// are the scarce resource that distribution scorers fight over, so they
/// are placed while every class still has room.
fn unit_importance(ctx: &SearchContext, unit: usize) -> usize {
    ctx.cohort.units()[unit]
        .members
        .iter()
        .map(|&student| {
            ctx.distribution_matchers
                .iter()
                .filter(|matcher| matcher.matches(&ctx.cohort.students()[student]))
                .count()
        })
        .sum()
}

fn placement_order(ctx: &SearchContext) -> Vec<usize> {
    let importance: Vec<usize> =
        (0..ctx.cohort.unit_count()).map(|unit| unit_importance(ctx, unit)).collect();
    let mut order: Vec<usize> = (0..ctx.cohort.unit_count()).collect();
    order.sort_by_key(|&unit| {
        (
            Reverse(importance[unit] > 0),
            Reverse(ctx.cohort.units()[unit].size()),
            Reverse(importance[unit]),
            unit,
        )
    });
    order
}

/// The legal class with the best marginal score. Ties go to the class
/// with fewer students, then the lower index. `exclude` removes one
/// class from consideration, which turns placement into relocation.
pub(super) fn best_marginal_class(
    ctx: &SearchContext,
    partition: &Partition,
    unit: usize,
    sizes: &[usize],
    exclude: Option<u32>,
) -> Option<u32> {
    let mut candidate = partition.clone();
    let mut best: Option<(u32, f64, usize)> = None;

    for class in 0..ctx.num_classes {
        if Some(class) == exclude || !ctx.cohort.is_legal(partition, unit, class) {
            continue;
        }
        candidate.set(unit, class);
        let score = ctx.total_score(&candidate);
        let load = sizes[class as usize];
        let better = match best {
            None => true,
            Some((_, best_score, best_load)) => {
                score > best_score + EPSILON
                    || ((score - best_score).abs() <= EPSILON && load < best_load)
            }
        };
        if better {
            best = Some((class, score, load));
        }
    }
    best.map(|(class, _, _)| class)
}
