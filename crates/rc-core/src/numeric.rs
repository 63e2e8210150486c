use crate::CoreError;
use nalgebra::DVector;

/// Floating point type used throughout the solver.
pub type Real = f64;

/// Absolute/relative tolerance pair.
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Check every entry of a vector, reporting the first offending value.
pub fn ensure_finite_vector(v: &DVector<Real>, what: &'static str) -> Result<(), CoreError> {
    match v.iter().find(|x| !x.is_finite()) {
        Some(&value) => Err(CoreError::NonFinite { what, value }),
        None => Ok(()),
    }
}

/// Infinity norm, zero for empty vectors.
pub fn inf_norm(v: &DVector<Real>) -> Real {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

/// Clamp `v` into `[lo, hi]`, tolerating infinite bounds.
pub fn clamp_to_bounds(v: Real, lo: Real, hi: Real) -> Real {
    let mut out = v;
    if out < lo {
        out = lo;
    }
    if out > hi {
        out = hi;
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn clamp_stays_inside(v in -1e6_f64..1e6, lo in -10.0_f64..0.0, width in 0.0_f64..10.0) {
            let hi = lo + width;
            let c = clamp_to_bounds(v, lo, hi);
            prop_assert!(c >= lo && c <= hi);
        }

        #[test]
        fn inf_norm_bounds_entries(values in prop::collection::vec(-1e3_f64..1e3, 0..16)) {
            let v = DVector::from_vec(values.clone());
            let n = inf_norm(&v);
            for x in values {
                prop_assert!(x.abs() <= n);
            }
        }
    }
}
