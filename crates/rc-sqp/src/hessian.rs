//! Hessian approximations.

use nalgebra::{DMatrix, DVector};

/// Damped (Powell) BFGS update of `b` from step `s` and Lagrangian-gradient
/// change `y`. Returns `false` when the update was skipped.
///
/// Damping keeps `b` positive definite when `sᵀy` is small or negative.
pub fn damped_bfgs_update(b: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) -> bool {
    let s_norm = s.norm();
    if !(s_norm > 1e-14) || !y.iter().all(|v| v.is_finite()) {
        return false;
    }
    let bs = &*b * s;
    let sbs = s.dot(&bs);
    if !(sbs > 1e-14 * s_norm * s_norm) {
        return false;
    }
    let sy = s.dot(y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r = y * theta + &bs * (1.0 - theta);
    let sr = s.dot(&r);
    if !(sr > 0.0) {
        return false;
    }
    *b -= &bs * bs.transpose() / sbs;
    *b += &r * r.transpose() / sr;
    true
}

/// Add `delta` to the diagonal.
pub fn regularize(h: &mut DMatrix<f64>, delta: f64) {
    if delta > 0.0 {
        for i in 0..h.nrows().min(h.ncols()) {
            h[(i, i)] += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undamped_update_satisfies_secant() {
        let mut b = DMatrix::identity(2, 2);
        let s = DVector::from_vec(vec![1.0, 0.5]);
        let y = DVector::from_vec(vec![2.0, 1.5]);
        assert!(damped_bfgs_update(&mut b, &s, &y));
        let bs = &b * &s;
        assert!((bs - y).amax() < 1e-12);
    }

    #[test]
    fn negative_curvature_is_damped() {
        let mut b = DMatrix::identity(2, 2);
        let s = DVector::from_vec(vec![1.0, 0.0]);
        let y = DVector::from_vec(vec![-1.0, 0.0]);
        assert!(damped_bfgs_update(&mut b, &s, &y));
        let eig = b.clone().symmetric_eigenvalues();
        assert!(eig.iter().all(|l| *l > 0.0));
        assert!((&b - b.transpose()).amax() < 1e-14);
    }

    #[test]
    fn zero_step_is_skipped() {
        let mut b = DMatrix::identity(2, 2);
        let before = b.clone();
        assert!(!damped_bfgs_update(&mut b, &DVector::zeros(2), &DVector::zeros(2)));
        assert_eq!(b, before);
    }

    #[test]
    fn regularize_shifts_diagonal() {
        let mut h = DMatrix::zeros(2, 2);
        regularize(&mut h, 1e-3);
        assert_eq!(h[(0, 0)], 1e-3);
        assert_eq!(h[(0, 1)], 0.0);
    }
}
