//! Quadratic program data and the kernel contract.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{QpError, QpResult};

/// `min ½ xᵀHx + gᵀx  s.t.  A_eq x = b_eq,  lb <= A_in x <= ub`.
///
/// Infinite entries of `lb`/`ub` leave that side unconstrained.
#[derive(Clone, Debug, PartialEq)]
pub struct QpProblem {
    pub h: DMatrix<f64>,
    pub g: DVector<f64>,
    pub a_eq: DMatrix<f64>,
    pub b_eq: DVector<f64>,
    pub a_in: DMatrix<f64>,
    pub lb: DVector<f64>,
    pub ub: DVector<f64>,
}

impl QpProblem {
    /// Problem without constraints.
    pub fn unconstrained(h: DMatrix<f64>, g: DVector<f64>) -> Self {
        let n = g.len();
        Self {
            h,
            g,
            a_eq: DMatrix::zeros(0, n),
            b_eq: DVector::zeros(0),
            a_in: DMatrix::zeros(0, n),
            lb: DVector::zeros(0),
            ub: DVector::zeros(0),
        }
    }

    pub fn with_equalities(mut self, a_eq: DMatrix<f64>, b_eq: DVector<f64>) -> Self {
        self.a_eq = a_eq;
        self.b_eq = b_eq;
        self
    }

    pub fn with_inequalities(
        mut self,
        a_in: DMatrix<f64>,
        lb: DVector<f64>,
        ub: DVector<f64>,
    ) -> Self {
        self.a_in = a_in;
        self.lb = lb;
        self.ub = ub;
        self
    }

    pub fn num_variables(&self) -> usize {
        self.g.len()
    }

    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.h * x)) + self.g.dot(x)
    }

    /// Check shapes and finiteness.
    pub fn validate(&self) -> QpResult<()> {
        let n = self.g.len();
        let checks = [
            ("Hessian rows", n, self.h.nrows()),
            ("Hessian columns", n, self.h.ncols()),
            ("equality matrix columns", n, self.a_eq.ncols()),
            ("equality right-hand side", self.a_eq.nrows(), self.b_eq.len()),
            ("inequality matrix columns", n, self.a_in.ncols()),
            ("inequality lower bounds", self.a_in.nrows(), self.lb.len()),
            ("inequality upper bounds", self.a_in.nrows(), self.ub.len()),
        ];
        for (what, expected, got) in checks {
            if expected != got {
                return Err(QpError::DimensionMismatch {
                    what,
                    expected,
                    got,
                });
            }
        }
        let finite = self.h.iter().all(|v| v.is_finite())
            && self.g.iter().all(|v| v.is_finite())
            && self.a_eq.iter().all(|v| v.is_finite())
            && self.b_eq.iter().all(|v| v.is_finite())
            && self.a_in.iter().all(|v| v.is_finite());
        if !finite {
            return Err(QpError::InvalidData {
                what: "matrices and vectors must be finite",
            });
        }
        if self.lb.iter().chain(self.ub.iter()).any(|v| v.is_nan()) {
            return Err(QpError::InvalidData {
                what: "bounds must not be NaN",
            });
        }
        Ok(())
    }
}

/// Outcome reported by a kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    MaxIterations,
}

/// Primal-dual solution.
///
/// Multipliers satisfy `Hx + g - A_eqᵀ y_eq - A_inᵀ y_ineq = 0`; `y_ineq[i]`
/// is positive when the lower bound of row `i` is active and negative when
/// the upper bound is.
#[derive(Clone, Debug, PartialEq)]
pub struct QpSolution {
    pub x: DVector<f64>,
    pub y_eq: DVector<f64>,
    pub y_ineq: DVector<f64>,
    pub status: QpStatus,
    pub iterations: usize,
}

/// QP kernel consumed by the SQP loop.
pub trait QpSolver: Send + Sync {
    fn solve(&self, qp: &QpProblem) -> QpResult<QpSolution>;
}
