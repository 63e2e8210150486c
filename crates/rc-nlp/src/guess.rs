//! Initial guesses and receding-horizon shifting.

use nalgebra::DVector;
use rc_core::clamp_to_bounds;
use rc_expr::Var;
use rc_ocp::ConstraintKind;

use crate::error::NlpResult;
use crate::layout::Transcription;
use crate::transcription::Nlp;

impl Nlp {
    /// Intersection of all bounds placed directly on `var` by constraints of `kind`.
    fn direct_bounds(&self, var: Var, kind: ConstraintKind) -> (f64, f64) {
        self.ocp()
            .constraints_of(kind)
            .filter(|c| c.expr.as_var() == Some(var))
            .fold((f64::NEG_INFINITY, f64::INFINITY), |(lo, hi), c| {
                (lo.max(c.lower), hi.min(c.upper))
            })
    }

    fn direct_value(&self, var: Var, kind: ConstraintKind) -> Option<f64> {
        let (lo, hi) = self.direct_bounds(var, kind);
        (lo == hi).then_some(lo)
    }

    /// Default starting point.
    ///
    /// States take their start value (embedded state, else start equality,
    /// else 0); in multiple shooting, states with an end equality are
    /// interpolated linearly between start and end across the nodes.
    /// Parameters sit at the midpoint of their bounds, controls at 0
    /// projected into their bounds.
    pub fn initial_guess(&self) -> DVector<f64> {
        let l = *self.layout();
        let points = self.ocp().mesh().points().to_vec();
        let mut z = DVector::zeros(l.len());

        for i in 0..l.nx {
            let var = Var::State(i);
            let (lo, hi) = self.direct_bounds(var, ConstraintKind::Path);
            let start = self
                .initial_state()
                .map(|x| x[i])
                .or_else(|| self.direct_value(var, ConstraintKind::AtStart));
            let end = self.direct_value(var, ConstraintKind::AtEnd);
            let first = start.or(end).unwrap_or_else(|| clamp_to_bounds(0.0, lo, hi));
            for (k, s) in points.iter().enumerate() {
                let Some(off) = l.state_offset(k) else {
                    continue;
                };
                z[off + i] = match (start, end) {
                    (Some(a), Some(b)) => a + (b - a) * s,
                    _ => first,
                };
            }
        }

        for i in 0..l.nu {
            let (lo, hi) = self.direct_bounds(Var::Control(i), ConstraintKind::Path);
            let u = clamp_to_bounds(0.0, lo, hi);
            for k in 0..l.intervals {
                z[l.control_offset(k) + i] = u;
            }
        }

        for i in 0..l.np {
            let (lo, hi) = self.direct_bounds(Var::Param(i), ConstraintKind::Path);
            z[l.param_offset() + i] = match (lo.is_finite(), hi.is_finite()) {
                (true, true) => 0.5 * (lo + hi),
                (true, false) => lo,
                (false, true) => hi,
                (false, false) => 0.0,
            };
        }
        z
    }

    /// Overwrite node states by forward simulation from `x_0` with the
    /// controls of `z`. Single shooting has no node states and returns `z`.
    pub fn simulate_guess(&self, z: &DVector<f64>) -> NlpResult<DVector<f64>> {
        self.check_len(z)?;
        let l = *self.layout();
        if l.mode == Transcription::SingleShooting {
            return Ok(z.clone());
        }
        let traj = self.trajectory_by_simulation(z)?;
        let mut out = z.clone();
        for (k, x) in traj.iter().enumerate() {
            if let Some(off) = l.state_offset(k) {
                out.rows_mut(off, l.nx).copy_from(x);
            }
        }
        Ok(out)
    }

    fn trajectory_by_simulation(&self, z: &DVector<f64>) -> NlpResult<Vec<DVector<f64>>> {
        let l = *self.layout();
        let p = self.params(z);
        let mut x = z.rows(0, l.nx).into_owned();
        let mut out = Vec::with_capacity(l.intervals + 1);
        out.push(x.clone());
        for k in 0..l.intervals {
            let span = self.ocp().mesh().span(k);
            x = self.integrator().propagate(
                self.ocp().model(),
                &x,
                &self.control_at(z, k),
                &p,
                span,
                self.time(),
            )?;
            out.push(x.clone());
        }
        Ok(out)
    }

    /// Move every node and interval block `count` positions forward,
    /// duplicating the last block. Parameters are kept. In single shooting
    /// `x_0` is kept; callers replace it with a measurement.
    pub fn shift(&self, z: &DVector<f64>, count: usize) -> NlpResult<DVector<f64>> {
        self.check_len(z)?;
        let l = *self.layout();
        let n = l.intervals;
        let mut out = z.clone();
        for k in 0..n {
            let src = (k + count).min(n - 1);
            out.rows_mut(l.control_offset(k), l.nu)
                .copy_from(&z.rows(l.control_offset(src), l.nu));
        }
        if l.mode == Transcription::MultipleShooting {
            for k in 0..=n {
                let src = (k + count).min(n);
                if let (Some(dst), Some(from)) = (l.state_offset(k), l.state_offset(src)) {
                    out.rows_mut(dst, l.nx).copy_from(&z.rows(from, l.nx));
                }
            }
        }
        Ok(out)
    }
}
