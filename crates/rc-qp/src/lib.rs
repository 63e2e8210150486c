//! Quadratic programming kernel interface and a dense interior-point kernel.
//!
//! The SQP solver only depends on the [`QpSolver`] trait; [`InteriorPoint`]
//! is the built-in implementation for small dense problems.

pub mod error;
pub mod interior_point;
pub mod problem;

pub use error::{QpError, QpResult};
pub use interior_point::{InteriorPoint, QpSettings};
pub use problem::{QpProblem, QpSolution, QpSolver, QpStatus};
