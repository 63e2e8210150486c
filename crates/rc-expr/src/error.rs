//! Error types for expression validation.

use thiserror::Error;

use crate::expr::Var;

pub type ExprResult<T> = Result<T, ExprError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Expression references undeclared variable {var}")]
    UnknownVariable { var: Var },

    #[error("Expression contains non-finite constant {value}")]
    NonFiniteConstant { value: f64 },
}
