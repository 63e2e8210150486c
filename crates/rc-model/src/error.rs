//! Error types for model construction and integration.

use rc_core::CoreError;
use rc_expr::ExprError;
use thiserror::Error;

/// Errors raised while building or integrating a dynamics model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Numerical failure in {what} at t = {time}")]
    NumericalFailure { what: &'static str, time: f64 },

    #[error("Symbol name '{name}' is declared twice")]
    DuplicateSymbol { name: String },

    #[error("Differential equation for state '{state}' is defined twice")]
    DuplicateEquation { state: String },

    #[error("No differential equation for state '{state}'")]
    MissingEquation { state: String },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ModelResult<T> = Result<T, ModelError>;
