//! Construction errors for optimal control problems.

use rc_expr::ExprError;
use rc_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcpError {
    #[error("Infeasible bounds on {what}: lower {lower} > upper {upper}")]
    InfeasibleBounds {
        what: String,
        lower: f64,
        upper: f64,
    },

    #[error("Weight for {what} has dimension {got}, residual has {expected}")]
    WeightDimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Reference for {what} has length {got}, residual has {expected}")]
    ReferenceDimension {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid weight for {what}: {reason}")]
    InvalidWeight {
        what: &'static str,
        reason: &'static str,
    },

    #[error("Objective is already set")]
    ObjectiveAlreadySet,

    #[error("Missing {what}")]
    Missing { what: &'static str },

    #[error("Invalid mesh: {what}")]
    InvalidMesh { what: &'static str },

    #[error("Invalid horizon: {what}")]
    InvalidHorizon { what: &'static str },

    #[error("{what} must not depend on controls")]
    ControlDependence { what: &'static str },

    #[error("Least-squares node {node} is outside the mesh (last node {last})")]
    NodeOutOfRange { node: usize, last: usize },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Expr(#[from] ExprError),
}

pub type OcpResult<T> = Result<T, OcpError>;
