//! Error types for the SQP solver.
//!
//! Solve outcomes (convergence, infeasibility, iteration limits) are reported
//! as [`crate::SolveStatus`] values; errors here mean the solver could not be
//! set up or was called with inconsistent data.

use rc_nlp::NlpError;
use rc_ocp::OcpError;
use rc_qp::QpError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqpError {
    #[error("Invalid configuration: {what}")]
    Config { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Nlp(#[from] NlpError),

    #[error(transparent)]
    Ocp(#[from] OcpError),

    #[error(transparent)]
    Qp(#[from] QpError),
}

pub type SqpResult<T> = Result<T, SqpError>;
