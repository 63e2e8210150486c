//! Difference-quotient Jacobians, used to check analytic sensitivities.

use nalgebra::{DMatrix, DVector};

use crate::error::ModelResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DifferenceScheme {
    /// `(f(x + h) - f(x)) / h`, one extra evaluation per column.
    Forward,
    /// `(f(x + h) - f(x - h)) / 2h`, two per column, second order.
    Central,
}

/// Jacobian of `f` at `x` with per-column step `epsilon * max(|x_j|, 1)`.
pub fn difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
    scheme: DifferenceScheme,
) -> ModelResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> ModelResult<DVector<f64>>,
{
    let base = f(x)?;
    let mut jac = DMatrix::zeros(base.len(), x.len());
    let mut probe = x.clone();

    for j in 0..x.len() {
        let h = epsilon * x[j].abs().max(1.0);
        probe[j] = x[j] + h;
        let upper = f(&probe)?;
        let column = match scheme {
            DifferenceScheme::Forward => (upper - &base) / h,
            DifferenceScheme::Central => {
                probe[j] = x[j] - h;
                (upper - f(&probe)?) / (2.0 * h)
            }
        };
        probe[j] = x[j];
        jac.set_column(j, &column);
    }

    Ok(jac)
}

pub fn finite_difference_jacobian<F>(x: &DVector<f64>, f: F, epsilon: f64) -> ModelResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> ModelResult<DVector<f64>>,
{
    difference_jacobian(x, f, epsilon, DifferenceScheme::Forward)
}

pub fn central_difference_jacobian<F>(x: &DVector<f64>, f: F, epsilon: f64) -> ModelResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> ModelResult<DVector<f64>>,
{
    difference_jacobian(x, f, epsilon, DifferenceScheme::Central)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_differences_recover_a_linear_map() {
        let f = |x: &DVector<f64>| Ok(DVector::from_vec(vec![2.0 * x[0] + x[1], 3.0 * x[1]]));
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let jac = finite_difference_jacobian(&x, f, 1e-7).unwrap();
        let expected = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 3.0]);
        assert!((jac - expected).amax() < 1e-6);
    }

    #[test]
    fn central_is_exact_on_quadratics() {
        let f = |x: &DVector<f64>| Ok(DVector::from_vec(vec![x[0] * x[0]]));
        let x = DVector::from_vec(vec![3.0]);
        let jac = central_difference_jacobian(&x, f, 1e-4).unwrap();
        assert!((jac[(0, 0)] - 6.0).abs() < 1e-8);
    }

    #[test]
    fn errors_from_the_function_propagate() {
        let f = |_: &DVector<f64>| -> ModelResult<DVector<f64>> {
            Err(crate::error::ModelError::InvalidArg { what: "probe" })
        };
        let x = DVector::from_vec(vec![0.0]);
        assert!(difference_jacobian(&x, f, 1e-6, DifferenceScheme::Central).is_err());
    }
}
