//! Engine error taxonomy.
//!
//! Every failure carries enough context to act on: rule ids for definition
//! problems, student ids for constraint contradictions. Errors abort the run;
//! retries are the caller's responsibility.

use thiserror::Error;

/// Errors produced while compiling rules, validating constraints, or
/// searching for an assignment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A rule definition is malformed or does not match its declared type.
    /// Compilation aborts on the first offending rule.
    #[error("invalid definition for rule {rule_id}: {reason}")]
    RuleDefinition { rule_id: i64, reason: String },

    /// Two students are required to be together and separate at the same
    /// time, directly or through a chain of together rules. Detected before
    /// any search runs.
    #[error("students {student_a} and {student_b} are required both together and separate")]
    ConstraintConflict { student_a: i64, student_b: i64 },

    /// The search budget was exhausted without one partition that satisfies
    /// every hard constraint.
    #[error("no feasible assignment found within {iterations} iterations")]
    NoFeasibleAssignment { iterations: usize },

    /// The caller cancelled the run before any feasible partition was found.
    /// When a feasible best-so-far exists, cancellation returns it instead.
    #[error("assignment run cancelled")]
    Cancelled,

    /// The request itself cannot be served: empty cohort, zero classes,
    /// fewer students than classes, or an invalid tuning override.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

/// Convenience alias used throughout the engine.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
