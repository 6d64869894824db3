//! Genetic search over unit partitions.
//!
//! A generational loop with tournament selection, uniform crossover, a
//! repair pass that relocates units breaking a separate edge or
//! overloading a class, and per-gene mutation into a random legal class.
//! Elites carry over unchanged. Fitness is the weighted total score minus
//! a penalty per violated separate edge, so infeasible individuals can
//! survive as stepping stones but never win: only the best feasible
//! individual ever seen is reported.
//!
//! The initial population mixes one greedy seed, a few jittered copies of
//! it, and feasible random draws, which puts the search in a good basin
//! from generation zero.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::cohort::Partition;
use crate::error::{EngineError, EngineResult};

use super::config::GeneticConfig;
use super::greedy::{best_marginal_class, greedy_assignment};
use super::random::random_draw;
use super::{SearchContext, StopConditions};

/// Mutation rate applied to the jittered copies of the greedy seed.
const SEED_JITTER: f64 = 0.2;

#[derive(Clone)]
struct Chromosome {
    partition: Partition,
    fitness: f64,
    violations: usize,
}

impl Chromosome {
    fn fresh(partition: Partition) -> Self {
        Self {
            partition,
            fitness: f64::NEG_INFINITY,
            violations: usize::MAX,
        }
    }

    fn feasible(&self) -> bool {
        self.violations == 0
    }

    fn score_against(&mut self, ctx: &SearchContext, penalty: f64) {
        self.violations = ctx.cohort.separate_violations(&self.partition);
        self.fitness = ctx.total_score(&self.partition) - penalty * self.violations as f64;
    }
}

/// How a run ended, with the best fitness recorded per generation.
struct GeneticOutcome {
    best_feasible: Option<Partition>,
    generations: usize,
    stagnated: bool,
    cancelled: bool,
    fitness_history: Vec<f64>,
}

pub(crate) fn genetic_assignment(
    ctx: &SearchContext,
    generations: usize,
    config: &GeneticConfig,
    rng: &mut StdRng,
    stop: &StopConditions,
) -> EngineResult<Partition> {
    let outcome = evolve(ctx, generations, config, rng, stop);
    debug!(
        generations = outcome.generations,
        stagnated = outcome.stagnated,
        cancelled = outcome.cancelled,
        feasible = outcome.best_feasible.is_some(),
        best_fitness = ?outcome.fitness_history.last(),
        "genetic search finished"
    );
    match outcome.best_feasible {
        Some(partition) => Ok(partition),
        None if outcome.cancelled => Err(EngineError::Cancelled),
        None => Err(EngineError::NoFeasibleAssignment {
            iterations: outcome.generations,
        }),
    }
}

fn evolve(
    ctx: &SearchContext,
    generations: usize,
    config: &GeneticConfig,
    rng: &mut StdRng,
    stop: &StopConditions,
) -> GeneticOutcome {
    let mut population = init_population(ctx, config, rng);
    evaluate(ctx, config, &mut population);

    let mut best_fitness = peak_fitness(&population);
    let mut best_feasible = best_feasible_of(&population, None);
    let mut fitness_history = vec![best_fitness];
    let mut stagnation_counter = 0usize;
    let mut stagnated = false;
    let mut cancelled = false;
    let mut completed = 0usize;

    for _ in 0..generations {
        if stop.cancelled() {
            cancelled = true;
            break;
        }
        if stop.expired() {
            break;
        }

        // fittest first; the elite slice survives unchanged
        population.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap_or(Ordering::Equal));
        let elite_count = config.elite_count().min(population.len());
        let mut next_gen: Vec<Chromosome> = population[..elite_count].to_vec();

        while next_gen.len() < config.population_size {
            let a = tournament(&population, config.tournament_size, rng);
            let b = tournament(&population, config.tournament_size, rng);
            let mut child = if rng.random_range(0.0..1.0) < config.crossover_rate {
                crossover(&population[a].partition, &population[b].partition, rng)
            } else {
                population[a].partition.clone()
            };
            repair(ctx, &mut child);
            mutate(ctx, &mut child, config.mutation_rate, rng);
            next_gen.push(Chromosome::fresh(child));
        }

        // elites keep their fitness; only offspring need evaluation
        evaluate(ctx, config, &mut next_gen[elite_count..]);
        population = next_gen;
        completed += 1;

        let generation_best = peak_fitness(&population);
        best_feasible = best_feasible_of(&population, best_feasible);
        if generation_best > best_fitness {
            best_fitness = generation_best;
            stagnation_counter = 0;
        } else {
            stagnation_counter += 1;
        }
        fitness_history.push(best_fitness);

        if config.stagnation_limit > 0 && stagnation_counter >= config.stagnation_limit {
            stagnated = true;
            break;
        }
    }

    GeneticOutcome {
        best_feasible: best_feasible.map(|(_, partition)| partition),
        generations: completed,
        stagnated,
        cancelled,
        fitness_history,
    }
}

fn init_population(
    ctx: &SearchContext,
    config: &GeneticConfig,
    rng: &mut StdRng,
) -> Vec<Chromosome> {
    let mut population = Vec::with_capacity(config.population_size);

    if let Ok(seed) = greedy_assignment(ctx) {
        let variants = (config.population_size / 10)
            .max(1)
            .min(config.population_size - 1);
        population.push(Chromosome::fresh(seed.clone()));
        for _ in 0..variants {
            let mut variant = seed.clone();
            mutate(ctx, &mut variant, SEED_JITTER, rng);
            population.push(Chromosome::fresh(variant));
        }
    }

    while population.len() < config.population_size {
        let partition =
            random_draw(ctx, rng).unwrap_or_else(|| unconstrained_draw(ctx, rng));
        population.push(Chromosome::fresh(partition));
    }
    population
}

/// A uniform draw that ignores separate edges. Last resort for cohorts
/// where feasible draws keep failing; the penalty and the repair pass
/// push these back toward feasibility.
fn unconstrained_draw(ctx: &SearchContext, rng: &mut StdRng) -> Partition {
    let mut partition = Partition::empty(ctx.cohort.unit_count(), ctx.num_classes);
    for unit in 0..ctx.cohort.unit_count() {
        partition.set(unit, rng.random_range(0..ctx.num_classes));
    }
    partition
}

fn evaluate(ctx: &SearchContext, config: &GeneticConfig, chromosomes: &mut [Chromosome]) {
    let penalty = config.violation_penalty;
    if config.parallel {
        chromosomes
            .par_iter_mut()
            .for_each(|c| c.score_against(ctx, penalty));
    } else {
        chromosomes
            .iter_mut()
            .for_each(|c| c.score_against(ctx, penalty));
    }
}

fn peak_fitness(population: &[Chromosome]) -> f64 {
    population
        .iter()
        .map(|c| c.fitness)
        .fold(f64::NEG_INFINITY, f64::max)
}

fn best_feasible_of(
    population: &[Chromosome],
    current: Option<(f64, Partition)>,
) -> Option<(f64, Partition)> {
    let mut best = current;
    for chromosome in population.iter().filter(|c| c.feasible()) {
        let improved = best
            .as_ref()
            .map_or(true, |(fitness, _)| chromosome.fitness > *fitness);
        if improved {
            best = Some((chromosome.fitness, chromosome.partition.clone()));
        }
    }
    best
}

fn tournament(population: &[Chromosome], k: usize, rng: &mut StdRng) -> usize {
    let mut best = rng.random_range(0..population.len());
    for _ in 1..k {
        let challenger = rng.random_range(0..population.len());
        if population[challenger].fitness > population[best].fitness {
            best = challenger;
        }
    }
    best
}

/// Uniform crossover: each gene comes from either parent with equal odds.
fn crossover(a: &Partition, b: &Partition, rng: &mut StdRng) -> Partition {
    let mut child = a.clone();
    for unit in 0..child.unit_count() {
        if rng.random_bool(0.5) {
            child.set(unit, b.class_of(unit));
        }
    }
    child
}

/// Moves each selected gene to a random legal class different from its
/// current one. Genes with no legal alternative stay put, so mutation
/// never breaks a feasible individual.
fn mutate(ctx: &SearchContext, partition: &mut Partition, rate: f64, rng: &mut StdRng) {
    for unit in 0..partition.unit_count() {
        if rng.random_range(0.0..1.0) >= rate {
            continue;
        }
        let current = partition.class_of(unit);
        let candidates: Vec<u32> = (0..ctx.num_classes)
            .filter(|&class| class != current && ctx.cohort.is_legal(partition, unit, class))
            .collect();
        if candidates.is_empty() {
            continue;
        }
        partition.set(unit, candidates[rng.random_range(0..candidates.len())]);
    }
}

/// Relocates units that share a class with a separate neighbor or sit in
/// a class past the soft capacity. Targets are picked by the same
/// marginal rule as greedy placement; units with no legal target stay
/// and keep paying the penalty.
fn repair(ctx: &SearchContext, partition: &mut Partition) {
    let capacity = (ctx.cohort.student_count() as u32).div_ceil(ctx.num_classes) as usize + 1;
    let mut sizes = ctx.cohort.class_sizes(partition);

    for unit in 0..partition.unit_count() {
        let class = partition.class_of(unit);
        let broken = !ctx.cohort.is_legal(partition, unit, class);
        let overloaded = sizes[class as usize] > capacity;
        if !broken && !overloaded {
            continue;
        }
        if let Some(target) = best_marginal_class(ctx, partition, unit, &sizes, Some(class)) {
            let weight = ctx.cohort.units()[unit].size();
            sizes[class as usize] -= weight;
            sizes[target as usize] += weight;
            partition.set(unit, target);
        }
    }
}
