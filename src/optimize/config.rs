//! Genetic search configuration.
//!
//! [`GeneticConfig`] holds the tunables the assignment request does not
//! expose. Budget, seed, deadline, and cancellation are run-level concerns
//! and live in [`RunControl`](super::RunControl) instead.

/// Configuration for the genetic strategy.
///
/// # Defaults
///
/// ```
/// use homeroom::optimize::GeneticConfig;
///
/// let config = GeneticConfig::default();
/// assert_eq!(config.population_size, 60);
/// assert_eq!(config.tournament_size, 3);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use homeroom::optimize::GeneticConfig;
///
/// let config = GeneticConfig::default()
///     .with_population_size(100)
///     .with_mutation_rate(0.02)
///     .with_parallel(false);
/// ```
#[derive(Debug, Clone)]
pub struct GeneticConfig {
    /// Number of chromosomes in the population.
    ///
    /// Larger populations increase diversity but slow down each generation.
    /// Typical range: 30–150.
    pub population_size: usize,

    /// Contestants per tournament when selecting a parent.
    ///
    /// Larger tournaments increase selection pressure. Typical range: 2–7.
    pub tournament_size: usize,

    /// Fraction of the population preserved as elites (0.0–1.0).
    ///
    /// At least one elite is always kept, so the best fitness never
    /// regresses between generations.
    pub elite_ratio: f64,

    /// Probability of applying crossover to a pair of parents (0.0–1.0).
    ///
    /// When crossover is not applied, a clone of one parent is used.
    pub crossover_rate: f64,

    /// Per-gene probability of mutating a unit to another legal class
    /// (0.0–1.0).
    pub mutation_rate: f64,

    /// Number of generations with no best-fitness improvement before
    /// stopping.
    ///
    /// Set to 0 to disable stagnation-based termination.
    pub stagnation_limit: usize,

    /// Fitness penalty per violated separate requirement.
    ///
    /// Lets the search cross infeasible regions while keeping them
    /// unattractive. The returned answer is always feasible regardless.
    pub violation_penalty: f64,

    /// Whether to evaluate the population in parallel using rayon.
    pub parallel: bool,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 60,
            tournament_size: 3,
            elite_ratio: 0.1,
            crossover_rate: 0.9,
            mutation_rate: 0.05,
            stagnation_limit: 50,
            violation_penalty: 20.0,
            parallel: true,
        }
    }
}

impl GeneticConfig {
    /// Sizes the population for a cohort: one chromosome per unit, kept
    /// between 30 and 80.
    pub fn auto_for(unit_count: usize) -> Self {
        Self::default().with_population_size(unit_count.clamp(30, 80))
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the tournament size.
    pub fn with_tournament_size(mut self, k: usize) -> Self {
        self.tournament_size = k;
        self
    }

    /// Sets the elite ratio.
    pub fn with_elite_ratio(mut self, ratio: f64) -> Self {
        self.elite_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the per-gene mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the stagnation limit (0 to disable).
    pub fn with_stagnation_limit(mut self, limit: usize) -> Self {
        self.stagnation_limit = limit;
        self
    }

    /// Sets the per-violation fitness penalty.
    pub fn with_violation_penalty(mut self, penalty: f64) -> Self {
        self.violation_penalty = penalty.max(0.0);
        self
    }

    /// Enables or disables parallel evaluation.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The number of elites actually preserved, never less than 1.
    pub fn elite_count(&self) -> usize {
        ((self.population_size as f64 * self.elite_ratio) as usize).max(1)
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.population_size < 2 {
            return Err("population_size must be at least 2".into());
        }
        if self.tournament_size == 0 {
            return Err("tournament_size must be at least 1".into());
        }
        if self.elite_count() >= self.population_size {
            return Err("elite_ratio too high: elites fill entire population".into());
        }
        if !self.violation_penalty.is_finite() {
            return Err("violation_penalty must be finite".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeneticConfig::default();
        assert_eq!(config.population_size, 60);
        assert_eq!(config.tournament_size, 3);
        assert!((config.elite_ratio - 0.1).abs() < 1e-10);
        assert!((config.crossover_rate - 0.9).abs() < 1e-10);
        assert!((config.mutation_rate - 0.05).abs() < 1e-10);
        assert_eq!(config.stagnation_limit, 50);
        assert!((config.violation_penalty - 20.0).abs() < 1e-10);
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = GeneticConfig::default()
            .with_population_size(100)
            .with_tournament_size(5)
            .with_elite_ratio(0.2)
            .with_crossover_rate(0.8)
            .with_mutation_rate(0.02)
            .with_stagnation_limit(30)
            .with_violation_penalty(50.0)
            .with_parallel(false);

        assert_eq!(config.population_size, 100);
        assert_eq!(config.tournament_size, 5);
        assert!((config.elite_ratio - 0.2).abs() < 1e-10);
        assert!((config.crossover_rate - 0.8).abs() < 1e-10);
        assert!((config.mutation_rate - 0.02).abs() < 1e-10);
        assert_eq!(config.stagnation_limit, 30);
        assert!(!config.parallel);
    }

    #[test]
    fn test_rates_clamped() {
        let config = GeneticConfig::default()
            .with_elite_ratio(1.5)
            .with_crossover_rate(-0.5)
            .with_mutation_rate(2.0)
            .with_violation_penalty(-3.0);

        assert!((config.elite_ratio - 1.0).abs() < 1e-10);
        assert!((config.crossover_rate - 0.0).abs() < 1e-10);
        assert!((config.mutation_rate - 1.0).abs() < 1e-10);
        assert!((config.violation_penalty - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_auto_for_clamps_population() {
        assert_eq!(GeneticConfig::auto_for(10).population_size, 30);
        assert_eq!(GeneticConfig::auto_for(55).population_size, 55);
        assert_eq!(GeneticConfig::auto_for(500).population_size, 80);
    }

    #[test]
    fn test_elite_count_never_zero() {
        let config = GeneticConfig::default()
            .with_population_size(5)
            .with_elite_ratio(0.0);
        assert_eq!(config.elite_count(), 1);
    }

    #[test]
    fn test_validate_rejects_degenerate_configs() {
        assert!(GeneticConfig::default().with_population_size(1).validate().is_err());
        assert!(GeneticConfig::default().with_tournament_size(0).validate().is_err());
        let config = GeneticConfig::default()
            .with_population_size(3)
            .with_elite_ratio(1.0);
        assert!(config.validate().is_err());
    }
}
