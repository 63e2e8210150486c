//! Results of evaluating the transcribed program at one point.

use nalgebra::{DMatrix, DVector};
use rc_ocp::Weight;

/// Stacked least-squares residual `r = h - ref` with block-diagonal weight.
#[derive(Clone, Debug, PartialEq)]
pub struct LsqResidual {
    pub value: DVector<f64>,
    /// ∂r/∂z; empty when derivatives were not requested.
    pub jacobian: DMatrix<f64>,
    /// `(first row, weight)` of every block.
    pub blocks: Vec<(usize, Weight)>,
}

impl LsqResidual {
    /// Block-diagonal `W v`.
    pub fn weighted(&self, v: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::zeros(v.len());
        for (offset, w) in &self.blocks {
            let dim = w.dim();
            let part = w.apply(&v.rows(*offset, dim).into_owned());
            out.rows_mut(*offset, dim).copy_from(&part);
        }
        out
    }

    /// `½ rᵀ W r`
    pub fn objective(&self) -> f64 {
        0.5 * self.value.dot(&self.weighted(&self.value))
    }

    /// `Jᵀ W r`
    pub fn gradient(&self) -> DVector<f64> {
        self.jacobian.tr_mul(&self.weighted(&self.value))
    }

    /// Gauss-Newton Hessian `Jᵀ W J`.
    pub fn gauss_newton_hessian(&self) -> DMatrix<f64> {
        let mut wj = DMatrix::zeros(self.jacobian.nrows(), self.jacobian.ncols());
        for (offset, w) in &self.blocks {
            let dim = w.dim();
            let rows = self.jacobian.rows(*offset, dim);
            let block = match w {
                Weight::Diagonal(d) => {
                    let mut b = rows.into_owned();
                    for (i, wi) in d.iter().enumerate() {
                        b.row_mut(i).scale_mut(*wi);
                    }
                    b
                }
                Weight::Full(m) => m * rows,
            };
            wj.rows_mut(*offset, dim).copy_from(&block);
        }
        self.jacobian.tr_mul(&wj)
    }
}

/// Objective and constraint values, with first derivatives when requested.
///
/// Equalities read `eq = 0`; inequalities read `ineq_lower <= ineq <= ineq_upper`.
#[derive(Clone, Debug, PartialEq)]
pub struct NlpEval {
    pub objective: f64,
    pub gradient: DVector<f64>,
    pub eq: DVector<f64>,
    pub eq_jacobian: DMatrix<f64>,
    pub ineq: DVector<f64>,
    pub ineq_lower: DVector<f64>,
    pub ineq_upper: DVector<f64>,
    pub ineq_jacobian: DMatrix<f64>,
    pub residual: Option<LsqResidual>,
}

impl NlpEval {
    /// Largest violation of any equality or inequality, ∞-norm.
    pub fn constraint_violation(&self) -> f64 {
        let eq = self.eq.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()));
        let ineq = self
            .ineq
            .iter()
            .zip(self.ineq_lower.iter().zip(self.ineq_upper.iter()))
            .fold(0.0_f64, |acc, (c, (lo, hi))| {
                acc.max(lo - c).max(c - hi)
            });
        eq.max(ineq)
    }

    /// Sum of violations, the ℓ1 infeasibility used by merit functions.
    pub fn l1_violation(&self) -> f64 {
        let eq: f64 = self.eq.iter().map(|c| c.abs()).sum();
        let ineq: f64 = self
            .ineq
            .iter()
            .zip(self.ineq_lower.iter().zip(self.ineq_upper.iter()))
            .map(|(c, (lo, hi))| (lo - c).max(0.0) + (c - hi).max(0.0))
            .sum();
        eq + ineq
    }

    pub fn is_finite(&self) -> bool {
        self.objective.is_finite()
            && self.eq.iter().all(|v| v.is_finite())
            && self.ineq.iter().all(|v| v.is_finite())
    }
}

/// States, controls and intermediates at every mesh node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeTrajectory {
    pub times: Vec<f64>,
    pub states: Vec<DVector<f64>>,
    /// Control applied at each node; the last node repeats the last interval.
    pub controls: Vec<DVector<f64>>,
    pub params: DVector<f64>,
    pub intermediates: Vec<DVector<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual() -> LsqResidual {
        LsqResidual {
            value: DVector::from_vec(vec![1.0, 2.0, 3.0]),
            jacobian: DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
            blocks: vec![
                (0, Weight::Diagonal(DVector::from_vec(vec![2.0, 1.0]))),
                (2, Weight::Full(DMatrix::from_element(1, 1, 4.0))),
            ],
        }
    }

    #[test]
    fn objective_and_gradient() {
        let r = residual();
        // ½ (2·1 + 1·4 + 4·9)
        assert!((r.objective() - 21.0).abs() < 1e-14);
        let g = r.gradient();
        assert!((g[0] - (2.0 + 12.0)).abs() < 1e-14);
        assert!((g[1] - (2.0 + 12.0)).abs() < 1e-14);
    }

    #[test]
    fn gauss_newton_matches_dense_product() {
        let r = residual();
        let mut w = DMatrix::zeros(3, 3);
        w[(0, 0)] = 2.0;
        w[(1, 1)] = 1.0;
        w[(2, 2)] = 4.0;
        let dense = r.jacobian.transpose() * w * &r.jacobian;
        assert!((r.gauss_newton_hessian() - dense).amax() < 1e-14);
    }

    #[test]
    fn violation_measures() {
        let e = NlpEval {
            objective: 0.0,
            gradient: DVector::zeros(1),
            eq: DVector::from_vec(vec![-0.5]),
            eq_jacobian: DMatrix::zeros(1, 1),
            ineq: DVector::from_vec(vec![2.0, 0.0]),
            ineq_lower: DVector::from_vec(vec![0.0, 1.0]),
            ineq_upper: DVector::from_vec(vec![1.0, 3.0]),
            ineq_jacobian: DMatrix::zeros(2, 1),
            residual: None,
        };
        assert_eq!(e.constraint_violation(), 1.0);
        assert_eq!(e.l1_violation(), 2.5);
    }
}
