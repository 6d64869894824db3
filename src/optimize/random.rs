//! Repeated random feasible draws.
//!
//! Each iteration shuffles the unit visit order and places units one by
//! one: a handful of uniform class draws, then a least-loaded fallback
//! scan when the draws keep landing on conflicting classes. The best
//! scoring draw across all iterations wins.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::cohort::Partition;
use crate::error::{EngineError, EngineResult};

use super::{SearchContext, StopConditions};

/// Uniform draws per unit before scanning for the least-loaded legal class.
const RESAMPLE_LIMIT: usize = 10;

/// Draws one feasible partition. Returns `None` when some unit ends up
/// with no legal class under this visit order.
pub(crate) fn random_draw(ctx: &SearchContext, rng: &mut StdRng) -> Option<Partition> {
    let unit_count = ctx.cohort.unit_count();
    let mut order: Vec<usize> = (0..unit_count).collect();
    order.shuffle(rng);

    let mut partition = Partition::empty(unit_count, ctx.num_classes);
    let mut sizes = vec![0usize; ctx.num_classes as usize];
    for &unit in &order {
        let mut placed = None;
        for _ in 0..RESAMPLE_LIMIT {
            let class = rng.random_range(0..ctx.num_classes);
            if ctx.cohort.is_legal(&partition, unit, class) {
                placed = Some(class);
                break;
            }
        }
        let class = placed.or_else(|| least_loaded_legal(ctx, &partition, unit, &sizes))?;
        partition.set(unit, class);
        sizes[class as usize] += ctx.cohort.units()[unit].size();
    }
    Some(partition)
}

/// The least-loaded legal class, lowest index on ties.
fn least_loaded_legal(
    ctx: &SearchContext,
    partition: &Partition,
    unit: usize,
    sizes: &[usize],
) -> Option<u32> {
    (0..ctx.num_classes)
        .filter(|&class| ctx.cohort.is_legal(partition, unit, class))
        .min_by_key(|&class| sizes[class as usize])
}

pub(crate) fn random_assignment(
    ctx: &SearchContext,
    iterations: usize,
    rng: &mut StdRng,
    stop: &StopConditions,
) -> EngineResult<Partition> {
    let mut best: Option<(f64, Partition)> = None;
    let mut attempted = 0;

    for _ in 0..iterations {
        if stop.cancelled() {
            return best.map(|(_, p)| p).ok_or(EngineError::Cancelled);
        }
        attempted += 1;
        if let Some(candidate) = random_draw(ctx, rng) {
            let score = ctx.total_score(&candidate);
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                trace!(score, attempt = attempted, "random draw improved");
                best = Some((score, candidate));
            }
        }
        // checked after the draw so an expired budget still yields one
        // attempt and a best-so-far where one exists
        if stop.expired() {
            break;
        }
    }

    best.map(|(_, partition)| partition)
        .ok_or(EngineError::NoFeasibleAssignment { iterations: attempted })
}
