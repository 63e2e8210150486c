//! Error types for transcription and NLP evaluation.

use rc_model::ModelError;
use rc_ocp::OcpError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NlpError {
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Ocp(#[from] OcpError),
}

impl NlpError {
    /// Integration or evaluation produced non-finite values.
    pub fn is_numerical_failure(&self) -> bool {
        matches!(self, NlpError::Model(ModelError::NumericalFailure { .. }))
    }
}

pub type NlpResult<T> = Result<T, NlpError>;
