//! Sequential quadratic programming for transcribed optimal control problems.
//!
//! Provides:
//! - Solver configuration (YAML/JSON via serde)
//! - An explicit SQP state machine with observable phases
//! - Gauss-Newton and damped BFGS Hessian approximations
//! - ℓ1-merit backtracking line search and KKT-based convergence checks

pub mod config;
pub mod error;
pub mod hessian;
pub mod kkt;
pub mod line_search;
pub mod solver;
pub mod state;

pub use config::{HessianApproximation, LineSearchConfig, SolverConfig};
pub use error::{SqpError, SqpResult};
pub use kkt::KktResidual;
pub use solver::{InitialGuess, SqpSolver};
pub use state::{Phase, SolveReport, SolveStatus, SolverState};
