//! Assignment request parameters.

use serde::{Deserialize, Serialize};

/// Iteration budget bounds. Requests outside this range are clamped.
pub const MIN_ITERATIONS: usize = 100;
pub const MAX_ITERATIONS: usize = 5000;
const DEFAULT_ITERATIONS: usize = 1000;

/// Search strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Repeated uniform draws, best feasible kept.
    Random,
    /// Deterministic ordered placement by marginal score.
    Greedy,
    /// Genetic search. The default and primary strategy.
    #[default]
    Genetic,
}

/// Parameters of one assignment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub school_id: i64,
    pub grade: i32,
    pub year: i32,
    /// Number of classes to fill, at least 1.
    pub num_classes: u32,
    /// Display name for the produced assignment.
    pub name: String,
    #[serde(default)]
    pub method: Method,
    /// Iteration budget, clamped to [100, 5000].
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}

impl AssignmentRequest {
    /// Creates a request with the default method and iteration budget.
    pub fn new(school_id: i64, grade: i32, year: i32, num_classes: u32, name: impl Into<String>) -> Self {
        Self {
            school_id,
            grade,
            year,
            num_classes,
            name: name.into(),
            method: Method::default(),
            iterations: DEFAULT_ITERATIONS,
        }
    }

    /// Sets the search method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the iteration budget (clamped when the run starts).
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// The iteration budget clamped into its allowed range.
    pub fn clamped_iterations(&self) -> usize {
        self.iterations.clamp(MIN_ITERATIONS, MAX_ITERATIONS)
    }
}
