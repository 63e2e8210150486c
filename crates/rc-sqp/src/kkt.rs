//! First-order optimality residual.

use nalgebra::DVector;
use rc_core::inf_norm;
use rc_nlp::NlpEval;
use serde::{Deserialize, Serialize};

/// Components of the KKT residual, each an ∞-norm.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KktResidual {
    pub stationarity: f64,
    pub primal: f64,
    pub dual: f64,
    pub complementarity: f64,
}

impl KktResidual {
    /// Multiplier signs follow the QP convention: `y_ineq > 0` on an active
    /// lower bound, `< 0` on an active upper bound.
    pub fn compute(eval: &NlpEval, y_eq: &DVector<f64>, y_ineq: &DVector<f64>) -> Self {
        let grad = lagrangian_gradient(eval, y_eq, y_ineq);
        let mut dual = 0.0_f64;
        let mut complementarity = 0.0_f64;
        for i in 0..eval.ineq.len() {
            let y = y_ineq[i];
            let (c, lo, hi) = (eval.ineq[i], eval.ineq_lower[i], eval.ineq_upper[i]);
            let lower_part = y.max(0.0);
            let upper_part = (-y).max(0.0);
            if lo.is_finite() {
                complementarity = complementarity.max((lower_part * (c - lo)).abs());
            } else {
                dual = dual.max(lower_part);
            }
            if hi.is_finite() {
                complementarity = complementarity.max((upper_part * (hi - c)).abs());
            } else {
                dual = dual.max(upper_part);
            }
        }
        Self {
            stationarity: inf_norm(&grad),
            primal: eval.constraint_violation(),
            dual,
            complementarity,
        }
    }

    pub fn max(&self) -> f64 {
        self.stationarity
            .max(self.primal)
            .max(self.dual)
            .max(self.complementarity)
    }
}

/// `∇f − J_Eᵀ y_eq − J_Iᵀ y_ineq`
pub fn lagrangian_gradient(
    eval: &NlpEval,
    y_eq: &DVector<f64>,
    y_ineq: &DVector<f64>,
) -> DVector<f64> {
    let mut g = eval.gradient.clone();
    if !y_eq.is_empty() {
        g -= eval.eq_jacobian.tr_mul(y_eq);
    }
    if !y_ineq.is_empty() {
        g -= eval.ineq_jacobian.tr_mul(y_ineq);
    }
    g
}
