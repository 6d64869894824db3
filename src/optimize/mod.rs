//! Assignment search strategies.
//!
//! Three interchangeable strategies produce candidate partitions over the
//! collapsed cohort: repeated random draws, deterministic greedy placement,
//! and the genetic loop (the default). All strategies guarantee that a
//! returned partition satisfies every hard constraint; soft quality is
//! best-effort within the iteration and time budget.

mod config;
mod genetic;
mod greedy;
mod random;

pub use config::GeneticConfig;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::cohort::{Cohort, Partition};
use crate::error::{EngineError, EngineResult};
use crate::model::Method;
use crate::scoring::{total_score, CompiledScorer, FieldMatcher};

/// Everything a strategy needs: the collapsed cohort, the compiled scorers,
/// the distribution matchers for ordering heuristics, and the class count.
pub struct SearchContext<'a> {
    pub cohort: &'a Cohort<'a>,
    pub scorers: &'a [CompiledScorer],
    pub distribution_matchers: &'a [FieldMatcher],
    pub num_classes: u32,
}

impl SearchContext<'_> {
    /// Weighted total score of a candidate, the search objective.
    pub fn total_score(&self, partition: &Partition) -> f64 {
        total_score(self.cohort, partition, self.scorers)
    }
}

/// Run-level controls shared by all strategies: seed, wall-clock budget,
/// cooperative cancellation, and genetic tuning overrides.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    /// Seed for reproducible runs. `None` draws a random seed.
    pub seed: Option<u64>,
    /// Wall-clock budget, checked at iteration and generation boundaries.
    /// Expiry returns the best result found so far.
    pub time_limit: Option<Duration>,
    /// Cooperative cancellation flag, checked once per iteration or
    /// generation.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Genetic tunables. `None` auto-sizes for the cohort.
    pub genetic: Option<GeneticConfig>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the seed for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Sets the cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Overrides the genetic configuration.
    pub fn with_genetic(mut self, config: GeneticConfig) -> Self {
        self.genetic = Some(config);
        self
    }
}

/// Stop conditions evaluated at iteration and generation boundaries.
pub(crate) struct StopConditions {
    deadline: Option<Instant>,
    cancel: Option<Arc<AtomicBool>>,
}

impl StopConditions {
    fn from_control(control: &RunControl) -> Self {
        Self {
            deadline: control.time_limit.map(|limit| Instant::now() + limit),
            cancel: control.cancel.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn none() -> Self {
        Self {
            deadline: None,
            cancel: None,
        }
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub(crate) fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Searches for the best feasible partition with the requested strategy.
///
/// The iteration budget bounds random draws and genetic generations; greedy
/// is deterministic and ignores it. Every returned partition is complete
/// and satisfies every hard constraint.
pub fn optimize(
    ctx: &SearchContext,
    method: Method,
    iterations: usize,
    control: &RunControl,
) -> EngineResult<Partition> {
    if ctx.num_classes == 0 {
        return Err(EngineError::InvalidRequest {
            reason: "num_classes must be at least 1".into(),
        });
    }

    let seed = control.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let stop = StopConditions::from_control(control);
    debug!(?method, iterations, seed, units = ctx.cohort.unit_count(), "starting search");

    match method {
        Method::Random => random::random_assignment(ctx, iterations, &mut rng, &stop),
        Method::Greedy => greedy::greedy_assignment(ctx),
        Method::Genetic => {
            let config = control
                .genetic
                .clone()
                .unwrap_or_else(|| GeneticConfig::auto_for(ctx.cohort.unit_count()));
            config
                .validate()
                .map_err(|reason| EngineError::InvalidRequest { reason })?;
            genetic::genetic_assignment(ctx, iterations, &config, &mut rng, &stop)
        }
    }
}
