//! Domain models of one assignment run.
//!
//! Students and rules are the immutable inputs; the request selects the
//! search; the assignment types are the scored output handed back to the
//! caller. All types serialize to the JSON shapes the administrative layer
//! stores and serves.

mod assignment;
mod request;
mod rule;
mod student;

pub use assignment::{Assignment, AssignmentDetail, AssignmentStatistics};
pub use request::{AssignmentRequest, Method, MAX_ITERATIONS, MIN_ITERATIONS};
pub use rule::{
    BalanceTarget, ComplexAction, Condition, ConditionOp, ConstraintKind, DistributionStrategy,
    Rule, RuleDefinition, RuleType,
};
pub use student::{FieldValue, Student};
