//! Dense primal-dual interior-point kernel (Mehrotra predictor-corrector).
//!
//! Two-sided rows are split into one-sided rows `G x - s = h, s >= 0`. Each
//! iteration eliminates the slacks and solves the reduced KKT system
//!
//! ```text
//! [ H + Gᵀ(Λ/S)G + δI   Eᵀ ] [ dx ]
//! [ E                  -δI ] [ -dy ]
//! ```
//!
//! by LU, once for the affine predictor and once for the centered corrector.

use nalgebra::{DMatrix, DVector};
use rc_core::inf_norm;
use serde::{Deserialize, Serialize};

use crate::error::QpResult;
use crate::problem::{QpProblem, QpSolution, QpSolver, QpStatus};

/// Iteration limits and tolerances of the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QpSettings {
    pub max_iterations: usize,
    /// Residual and complementarity tolerance.
    pub tolerance: f64,
    /// Static regularization of the KKT system.
    pub regularization: f64,
    /// Iterates beyond this ∞-norm are treated as diverging.
    pub divergence_bound: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-9,
            regularization: 1e-10,
            divergence_bound: 1e10,
        }
    }
}

/// Built-in dense kernel.
#[derive(Clone, Debug, Default)]
pub struct InteriorPoint {
    pub settings: QpSettings,
}

impl InteriorPoint {
    pub fn new(settings: QpSettings) -> Self {
        Self { settings }
    }
}

/// One-sided rows `G x >= h` with their origin in `A_in`.
struct OneSided {
    g: DMatrix<f64>,
    h: DVector<f64>,
    /// `(row of A_in, +1 for a lower bound / -1 for an upper bound)`
    origin: Vec<(usize, f64)>,
}

fn split_bounds(qp: &QpProblem) -> OneSided {
    let n = qp.num_variables();
    let mut origin = Vec::new();
    for i in 0..qp.a_in.nrows() {
        if qp.lb[i].is_finite() {
            origin.push((i, 1.0));
        }
        if qp.ub[i].is_finite() {
            origin.push((i, -1.0));
        }
    }
    let mut g = DMatrix::zeros(origin.len(), n);
    let mut h = DVector::zeros(origin.len());
    for (r, (i, sign)) in origin.iter().enumerate() {
        g.set_row(r, &(qp.a_in.row(*i) * *sign));
        h[r] = if *sign > 0.0 { qp.lb[*i] } else { -qp.ub[*i] };
    }
    OneSided { g, h, origin }
}

/// Least-squares check that `A_eq x = b_eq` has a solution.
fn equalities_consistent(qp: &QpProblem, tol: f64) -> bool {
    if qp.a_eq.nrows() == 0 {
        return true;
    }
    let svd = qp.a_eq.clone().svd(true, true);
    match svd.solve(&qp.b_eq, 1e-12) {
        Ok(x) => {
            let residual = &qp.a_eq * x - &qp.b_eq;
            inf_norm(&residual) <= tol.sqrt() * (1.0 + inf_norm(&qp.b_eq))
        }
        Err(_) => true,
    }
}

/// Largest step in `(0, 1]` keeping `v + α dv >= 0`, damped by `fraction`.
fn max_step(v: &DVector<f64>, dv: &DVector<f64>, fraction: f64) -> f64 {
    let mut alpha: f64 = 1.0;
    for (vi, di) in v.iter().zip(dv.iter()) {
        if *di < 0.0 {
            alpha = alpha.min(-fraction * vi / di);
        }
    }
    alpha
}

struct Iterate {
    x: DVector<f64>,
    y: DVector<f64>,
    s: DVector<f64>,
    lambda: DVector<f64>,
}

/// `(dx, dy, ds, dλ)`
type Step = (DVector<f64>, DVector<f64>, DVector<f64>, DVector<f64>);

struct Residuals {
    dual: DVector<f64>,
    eq: DVector<f64>,
    ineq: DVector<f64>,
    mu: f64,
}

impl Residuals {
    fn primal_norm(&self) -> f64 {
        inf_norm(&self.eq).max(inf_norm(&self.ineq))
    }
}

impl QpSolver for InteriorPoint {
    fn solve(&self, qp: &QpProblem) -> QpResult<QpSolution> {
        qp.validate()?;
        let cfg = self.settings;
        let n = qp.num_variables();
        let me = qp.a_eq.nrows();

        let infeasible = |iterations| QpSolution {
            x: DVector::zeros(n),
            y_eq: DVector::zeros(me),
            y_ineq: DVector::zeros(qp.a_in.nrows()),
            status: QpStatus::Infeasible,
            iterations,
        };

        if qp.lb.iter().zip(qp.ub.iter()).any(|(lo, hi)| lo > hi) {
            tracing::debug!("qp bounds cross");
            return Ok(infeasible(0));
        }
        if !equalities_consistent(qp, cfg.tolerance) {
            tracing::debug!("qp equalities inconsistent");
            return Ok(infeasible(0));
        }

        let rows = split_bounds(qp);
        let mi = rows.h.len();
        let e = &qp.a_eq;
        let g = &rows.g;

        let mut it = Iterate {
            x: DVector::zeros(n),
            y: DVector::zeros(me),
            s: DVector::zeros(mi),
            lambda: DVector::from_element(mi, 1.0),
        };
        let gx = g * &it.x - &rows.h;
        it.s = gx.map(|v| v.max(1.0));

        let primal_scale = 1.0 + inf_norm(&qp.b_eq).max(inf_norm(&rows.h));
        let dual_scale = 1.0 + inf_norm(&qp.g);

        let residuals = |it: &Iterate| -> Residuals {
            let dual = &qp.h * &it.x + &qp.g - e.tr_mul(&it.y) - g.tr_mul(&it.lambda);
            let eq = e * &it.x - &qp.b_eq;
            let ineq = g * &it.x - &it.s - &rows.h;
            let mu = if mi > 0 {
                it.s.dot(&it.lambda) / mi as f64
            } else {
                0.0
            };
            Residuals { dual, eq, ineq, mu }
        };

        let mut res = residuals(&it);
        let mut status = None;
        let mut iterations = 0;

        while iterations < cfg.max_iterations {
            if res.primal_norm() <= cfg.tolerance * primal_scale
                && inf_norm(&res.dual) <= cfg.tolerance * dual_scale
                && res.mu <= cfg.tolerance
            {
                status = Some(QpStatus::Optimal);
                break;
            }
            if inf_norm(&it.x) > cfg.divergence_bound {
                status = Some(QpStatus::Unbounded);
                break;
            }

            let d = it.lambda.component_div(&it.s);
            let mut kkt = DMatrix::zeros(n + me, n + me);
            {
                let mut k = qp.h.clone();
                let mut dg = g.clone();
                for (r, di) in d.iter().enumerate() {
                    dg.row_mut(r).scale_mut(*di);
                }
                k += g.tr_mul(&dg);
                for i in 0..n {
                    k[(i, i)] += cfg.regularization;
                }
                kkt.view_mut((0, 0), (n, n)).copy_from(&k);
                kkt.view_mut((n, 0), (me, n)).copy_from(e);
                kkt.view_mut((0, n), (n, me)).copy_from(&e.transpose());
                for i in 0..me {
                    kkt[(n + i, n + i)] = -cfg.regularization;
                }
            }
            let lu = kkt.lu();

            // Solve for a complementarity residual r_c; returns (dx, dy, ds, dλ).
            let direction = |rc: &DVector<f64>| -> Option<Step> {
                let v = (rc + it.lambda.component_mul(&res.ineq)).component_div(&it.s);
                let mut rhs = DVector::zeros(n + me);
                rhs.rows_mut(0, n)
                    .copy_from(&(-&res.dual - g.tr_mul(&v)));
                rhs.rows_mut(n, me).copy_from(&(-&res.eq));
                let sol = lu.solve(&rhs)?;
                let dx = sol.rows(0, n).into_owned();
                let dy = -sol.rows(n, me).into_owned();
                let ds = g * &dx + &res.ineq;
                let dl = -(rc + it.lambda.component_mul(&ds)).component_div(&it.s);
                Some((dx, dy, ds, dl))
            };

            let rc_aff = it.s.component_mul(&it.lambda);
            let Some((_, _, ds_a, dl_a)) = direction(&rc_aff) else {
                tracing::debug!(iterations, "qp kkt system singular");
                break;
            };

            let (dx, dy, ds, dl) = if mi > 0 {
                let a_s = max_step(&it.s, &ds_a, 1.0);
                let a_l = max_step(&it.lambda, &dl_a, 1.0);
                let mu_aff = (&it.s + &ds_a * a_s).dot(&(&it.lambda + &dl_a * a_l)) / mi as f64;
                let sigma = (mu_aff / res.mu).powi(3).clamp(0.0, 1.0);
                let rc = rc_aff + ds_a.component_mul(&dl_a)
                    - DVector::from_element(mi, sigma * res.mu);
                match direction(&rc) {
                    Some(step) => step,
                    None => break,
                }
            } else {
                match direction(&rc_aff) {
                    Some(step) => step,
                    None => break,
                }
            };

            let alpha = max_step(&it.s, &ds, 0.995).min(max_step(&it.lambda, &dl, 0.995));
            let next = Iterate {
                x: &it.x + &dx * alpha,
                y: &it.y + &dy * alpha,
                s: &it.s + &ds * alpha,
                lambda: &it.lambda + &dl * alpha,
            };
            let finite = next.x.iter().all(|v| v.is_finite())
                && next.y.iter().all(|v| v.is_finite())
                && next.lambda.iter().all(|v| v.is_finite())
                && next.s.iter().all(|v| v.is_finite());
            if !finite {
                tracing::debug!(iterations, "qp iterate became non-finite");
                break;
            }
            it = next;
            res = residuals(&it);
            iterations += 1;
        }

        let status = status.unwrap_or_else(|| {
            if inf_norm(&it.x) > cfg.divergence_bound {
                QpStatus::Unbounded
            } else if res.primal_norm() > cfg.tolerance.sqrt() * primal_scale {
                QpStatus::Infeasible
            } else if inf_norm(&res.dual) > cfg.tolerance.sqrt() * dual_scale {
                QpStatus::Unbounded
            } else {
                QpStatus::MaxIterations
            }
        });

        let mut y_ineq = DVector::zeros(qp.a_in.nrows());
        for ((row, sign), l) in rows.origin.iter().zip(it.lambda.iter()) {
            y_ineq[*row] += sign * l;
        }
        tracing::trace!(?status, iterations, mu = res.mu, "qp solved");

        Ok(QpSolution {
            x: it.x,
            y_eq: it.y,
            y_ineq,
            status,
            iterations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel() -> InteriorPoint {
        InteriorPoint::default()
    }

    #[test]
    fn unconstrained_minimum() {
        let h = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let g = DVector::from_vec(vec![-2.0, -4.0]);
        let sol = kernel().solve(&QpProblem::unconstrained(h, g)).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert!((sol.x[0] - 1.0).abs() < 1e-8);
        assert!((sol.x[1] - 1.0).abs() < 1e-8);
    }

    #[test]
    fn equality_multiplier_sign() {
        // min ½x² s.t. x = 2: x - y = 0 gives y = 2
        let qp = QpProblem::unconstrained(DMatrix::identity(1, 1), DVector::zeros(1))
            .with_equalities(DMatrix::identity(1, 1), DVector::from_vec(vec![2.0]));
        let sol = kernel().solve(&qp).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert!((sol.x[0] - 2.0).abs() < 1e-8);
        assert!((sol.y_eq[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn active_bounds_have_signed_multipliers() {
        // min ½x² - 3x + ½y² + 3y, 0 <= x <= 1, -1 <= y <= 1
        let qp = QpProblem::unconstrained(
            DMatrix::identity(2, 2),
            DVector::from_vec(vec![-3.0, 3.0]),
        )
        .with_inequalities(
            DMatrix::identity(2, 2),
            DVector::from_vec(vec![0.0, -1.0]),
            DVector::from_vec(vec![1.0, 1.0]),
        );
        let sol = kernel().solve(&qp).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert!((sol.x[0] - 1.0).abs() < 1e-7);
        assert!((sol.x[1] + 1.0).abs() < 1e-7);
        // upper bound on x active: negative; lower bound on y active: positive
        assert!((sol.y_ineq[0] + 2.0).abs() < 1e-6);
        assert!((sol.y_ineq[1] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn crossing_bounds_are_infeasible() {
        let qp = QpProblem::unconstrained(DMatrix::identity(1, 1), DVector::zeros(1))
            .with_inequalities(
                DMatrix::identity(1, 1),
                DVector::from_vec(vec![1.0]),
                DVector::from_vec(vec![0.0]),
            );
        assert_eq!(kernel().solve(&qp).unwrap().status, QpStatus::Infeasible);
    }

    #[test]
    fn inconsistent_equalities_are_infeasible() {
        let qp = QpProblem::unconstrained(DMatrix::identity(2, 2), DVector::zeros(2))
            .with_equalities(
                DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]),
                DVector::from_vec(vec![1.0, 2.0]),
            );
        assert_eq!(kernel().solve(&qp).unwrap().status, QpStatus::Infeasible);
    }

    #[test]
    fn redundant_equalities_are_fine() {
        let qp = QpProblem::unconstrained(DMatrix::identity(2, 2), DVector::zeros(2))
            .with_equalities(
                DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 2.0, 2.0]),
                DVector::from_vec(vec![1.0, 2.0]),
            );
        let sol = kernel().solve(&qp).unwrap();
        assert_eq!(sol.status, QpStatus::Optimal);
        assert!((sol.x[0] - 0.5).abs() < 1e-6);
        assert!((sol.x[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn separate_rows_that_conflict_are_infeasible() {
        // x >= 1 and x <= 0 on different rows
        let qp = QpProblem::unconstrained(DMatrix::identity(1, 1), DVector::zeros(1))
            .with_inequalities(
                DMatrix::from_row_slice(2, 1, &[1.0, 1.0]),
                DVector::from_vec(vec![1.0, f64::NEG_INFINITY]),
                DVector::from_vec(vec![f64::INFINITY, 0.0]),
            );
        assert_eq!(kernel().solve(&qp).unwrap().status, QpStatus::Infeasible);
    }

    #[test]
    fn linear_objective_without_bound_is_unbounded() {
        // min -x s.t. x >= 0
        let qp = QpProblem::unconstrained(DMatrix::zeros(1, 1), DVector::from_vec(vec![-1.0]))
            .with_inequalities(
                DMatrix::identity(1, 1),
                DVector::from_vec(vec![0.0]),
                DVector::from_vec(vec![f64::INFINITY]),
            );
        assert_eq!(kernel().solve(&qp).unwrap().status, QpStatus::Unbounded);
    }
}
