//! Errors for malformed quadratic programs.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QpError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid QP data: {what}")]
    InvalidData { what: &'static str },
}

pub type QpResult<T> = Result<T, QpError>;
