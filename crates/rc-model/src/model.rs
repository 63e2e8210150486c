//! DynamicsModel trait for pluggable vector fields.

use nalgebra::{DMatrix, DVector};
use rc_expr::{Dims, Point};

use crate::error::ModelResult;

/// Right-hand side value with its partial derivatives.
#[derive(Clone, Debug, PartialEq)]
pub struct RhsJacobian {
    pub value: DVector<f64>,
    /// ∂f/∂x, `nx × nx`
    pub dx: DMatrix<f64>,
    /// ∂f/∂u, `nx × nu`
    pub du: DMatrix<f64>,
    /// ∂f/∂p, `nx × np`
    pub dp: DMatrix<f64>,
    /// ∂f/∂t
    pub dt: DVector<f64>,
}

impl RhsJacobian {
    pub fn zeros(dims: Dims) -> Self {
        Self {
            value: DVector::zeros(dims.nx),
            dx: DMatrix::zeros(dims.nx, dims.nx),
            du: DMatrix::zeros(dims.nx, dims.nu),
            dp: DMatrix::zeros(dims.nx, dims.np),
            dt: DVector::zeros(dims.nx),
        }
    }
}

/// Continuous-time vector field `ẋ = f(x, u, p, t)`.
///
/// Implementations must be pure: the same point always yields the same
/// value. Integration may call them from several threads at once.
pub trait DynamicsModel: Send + Sync {
    fn dims(&self) -> Dims;

    /// Evaluate `f` at a point.
    fn rhs(&self, pt: &Point<'_>) -> ModelResult<DVector<f64>>;

    /// Evaluate `f` and all of its first-order partial derivatives.
    fn rhs_jacobian(&self, pt: &Point<'_>) -> ModelResult<RhsJacobian>;
}
