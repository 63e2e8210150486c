//! Forward simulation with piecewise-constant controls.

use nalgebra::DVector;
use rc_core::ensure_finite_vector;

use crate::error::{ModelError, ModelResult};
use crate::integrator::{IntegratorType, RungeKutta};
use crate::model::DynamicsModel;
use crate::time::TimeMap;

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct SimOptions {
    /// Start time (seconds)
    pub t0: f64,
    /// Length of one control sample (seconds)
    pub sample_time: f64,
    /// Integrator sub-steps per sample
    pub steps_per_sample: usize,
    /// Integrator type (default: RK4)
    pub integrator: IntegratorType,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            t0: 0.0,
            sample_time: 0.1,
            steps_per_sample: 10,
            integrator: IntegratorType::default(),
        }
    }
}

/// Record of simulation results, one entry per sample boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct SimRecord {
    /// Time points (seconds)
    pub t: Vec<f64>,
    /// State snapshots
    pub x: Vec<DVector<f64>>,
}

impl SimRecord {
    pub fn final_state(&self) -> Option<&DVector<f64>> {
        self.x.last()
    }
}

/// Simulate `model` from `x0`, holding `controls[k]` over sample `k`.
pub fn simulate<M: DynamicsModel + ?Sized>(
    model: &M,
    x0: &DVector<f64>,
    controls: &[DVector<f64>],
    p: &DVector<f64>,
    opts: &SimOptions,
) -> ModelResult<SimRecord> {
    if !(opts.sample_time > 0.0) {
        return Err(ModelError::InvalidArg {
            what: "sample_time must be positive",
        });
    }
    ensure_finite_vector(x0, "initial state")?;
    let rk = RungeKutta::new(opts.integrator, opts.steps_per_sample)?;

    let mut t = opts.t0;
    let mut x = x0.clone();
    let mut record = SimRecord {
        t: Vec::with_capacity(controls.len() + 1),
        x: Vec::with_capacity(controls.len() + 1),
    };
    record.t.push(t);
    record.x.push(x.clone());

    for u in controls {
        let time = TimeMap::fixed(t, opts.sample_time);
        x = rk.propagate(model, &x, u, p, (0.0, 1.0), &time)?;
        t += opts.sample_time;
        record.t.push(t);
        record.x.push(x.clone());
    }

    tracing::trace!(samples = controls.len(), t_end = t, "simulation finished");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode::OdeModel;
    use rc_expr::{Dims, Expr};

    fn double_integrator() -> OdeModel {
        OdeModel::new(
            Dims::new(2, 1, 0),
            vec![Expr::state(1), Expr::control(0)],
        )
        .unwrap()
    }

    #[test]
    fn sim_options_defaults() {
        let opts = SimOptions::default();
        assert_eq!(opts.t0, 0.0);
        assert_eq!(opts.sample_time, 0.1);
        assert_eq!(opts.steps_per_sample, 10);
        assert_eq!(opts.integrator, IntegratorType::Rk4);
    }

    #[test]
    fn constant_acceleration_is_exact() {
        let controls = vec![DVector::from_vec(vec![1.0]); 10];
        let opts = SimOptions {
            sample_time: 0.1,
            steps_per_sample: 2,
            ..SimOptions::default()
        };
        let rec = simulate(
            &double_integrator(),
            &DVector::zeros(2),
            &controls,
            &DVector::zeros(0),
            &opts,
        )
        .unwrap();
        assert_eq!(rec.t.len(), 11);
        assert!((rec.t[10] - 1.0).abs() < 1e-12);
        let x = rec.final_state().unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!((x[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sim_options_invalid() {
        let opts = SimOptions {
            sample_time: 0.0,
            ..SimOptions::default()
        };
        let res = simulate(
            &double_integrator(),
            &DVector::zeros(2),
            &[],
            &DVector::zeros(0),
            &opts,
        );
        assert!(matches!(res, Err(ModelError::InvalidArg { .. })));
    }

    #[test]
    fn non_finite_start_is_rejected() {
        let x0 = DVector::from_vec(vec![0.0, f64::NAN]);
        let res = simulate(
            &double_integrator(),
            &x0,
            &[],
            &DVector::zeros(0),
            &SimOptions::default(),
        );
        assert!(matches!(res, Err(ModelError::Core(_))));
    }
}
