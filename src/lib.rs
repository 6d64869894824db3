//! Class assignment optimization engine.
//!
//! Partitions a grade's students into classes so that weighted soft rules
//! score as high as possible while hard pairwise constraints always hold:
//!
//! - **Balance**: even out a numeric or categorical field across classes
//!   (gender mix, grade averages).
//! - **Distribution**: spread flagged students across classes, or cap how
//!   many land in any one class.
//! - **Constraint**: keep listed students together, or apart, without
//!   exception.
//! - **Complex**: reward or penalize co-locating students that match a
//!   condition list.
//!
//! Three search strategies share one scoring pipeline: repeated **random**
//! feasible draws, deterministic **greedy** placement, and a **genetic**
//! loop seeded with the greedy result (the default).
//!
//! # Pipeline
//!
//! [`engine::Engine`] wires the stages: rules compile into scorers and
//! pairwise constraints, the constraint graph validates the hard rules and
//! collapses must-together groups into units, a strategy searches over
//! unit partitions, and the winner is evaluated and assembled into a
//! [`model::Assignment`] with per-rule scores and class statistics.

pub mod assemble;
pub mod cohort;
pub mod compile;
pub mod constraint;
pub mod engine;
pub mod error;
pub mod model;
pub mod optimize;
pub mod scoring;

pub use error::{EngineError, EngineResult};
