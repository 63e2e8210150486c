//! Normalized horizon time.
//!
//! Integration runs in normalized time `s ∈ [0, 1]` with `t = t0 + L(p)·s`,
//! so a horizon whose length is a free parameter needs no special casing in
//! the integrator beyond the chain rule through `L`.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Length of the horizon.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum HorizonLength {
    /// Constant length in seconds.
    Fixed(f64),
    /// Length given by the parameter with this index.
    Param(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeMap {
    pub t0: f64,
    pub length: HorizonLength,
}

impl TimeMap {
    pub fn fixed(t0: f64, length: f64) -> Self {
        Self {
            t0,
            length: HorizonLength::Fixed(length),
        }
    }

    pub fn free(t0: f64, param: usize) -> Self {
        Self {
            t0,
            length: HorizonLength::Param(param),
        }
    }

    /// Horizon length `L(p)`. A missing parameter reads as NaN.
    pub fn length(&self, p: &DVector<f64>) -> f64 {
        match self.length {
            HorizonLength::Fixed(len) => len,
            HorizonLength::Param(i) => p.get(i).copied().unwrap_or(f64::NAN),
        }
    }

    /// Parameter index `L` depends on, if any. `∂L/∂p` is the unit vector there.
    pub fn length_param(&self) -> Option<usize> {
        match self.length {
            HorizonLength::Fixed(_) => None,
            HorizonLength::Param(i) => Some(i),
        }
    }

    pub fn time_at(&self, s: f64, p: &DVector<f64>) -> f64 {
        self.t0 + self.length(p) * s
    }

    /// Same horizon starting at `t0`.
    pub fn starting_at(self, t0: f64) -> Self {
        Self { t0, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_length_reads_parameter() {
        let map = TimeMap::free(1.0, 1);
        let p = DVector::from_vec(vec![0.0, 8.0]);
        assert_eq!(map.length(&p), 8.0);
        assert_eq!(map.time_at(0.5, &p), 5.0);
        assert_eq!(map.length_param(), Some(1));
    }

    #[test]
    fn fixed_length_ignores_parameters() {
        let map = TimeMap::fixed(0.0, 10.0).starting_at(2.0);
        assert_eq!(map.length(&DVector::zeros(0)), 10.0);
        assert_eq!(map.time_at(1.0, &DVector::zeros(0)), 12.0);
        assert!(map.length_param().is_none());
    }
}
