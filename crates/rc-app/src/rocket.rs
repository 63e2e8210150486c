//! Minimum-time rocket flight: travel 10 units and stop, free final time.

use rc_ocp::{Constraint, ConstraintKind, Mesh, Ocp, OcpBuilder};
use rc_sqp::SolverConfig;

use crate::error::AppResult;

pub const DISTANCE: f64 = 10.0;
pub const MIN_DURATION: f64 = 5.0;
pub const MAX_DURATION: f64 = 15.0;
pub const MAX_THRUST: f64 = 1.1;
pub const VELOCITY_BOUNDS: (f64, f64) = (-0.1, 1.7);

/// States `s, v, m`, thrust `u`, duration `T`.
pub fn build(intervals: usize) -> AppResult<Ocp> {
    let mut ocp = OcpBuilder::new();
    let s = ocp.state("s")?;
    let v = ocp.state("v")?;
    let m = ocp.state("m")?;
    let u = ocp.control("u")?;
    let t = ocp.parameter("T")?;

    ocp.dot(&s, v.clone())?;
    ocp.dot(&v, (u.clone() - 0.2 * v.clone().square()) / m.clone())?;
    ocp.dot(&m, -0.01 * u.clone().square())?;
    ocp.free_horizon(0.0, &t)?;
    ocp.mesh(Mesh::uniform(intervals)?);

    ocp.subject_to(Constraint::equal(ConstraintKind::AtStart, s.clone(), 0.0))
        .subject_to(Constraint::equal(ConstraintKind::AtStart, v.clone(), 0.0))
        .subject_to(Constraint::equal(ConstraintKind::AtStart, m, 1.0))
        .subject_to(Constraint::equal(ConstraintKind::AtEnd, s, DISTANCE))
        .subject_to(Constraint::equal(ConstraintKind::AtEnd, v.clone(), 0.0))
        .subject_to(Constraint::bounded(
            ConstraintKind::Path,
            v,
            VELOCITY_BOUNDS.0,
            VELOCITY_BOUNDS.1,
        ))
        .subject_to(Constraint::bounded(ConstraintKind::Path, u, -MAX_THRUST, MAX_THRUST))
        .subject_to(Constraint::bounded(
            ConstraintKind::Path,
            t.clone(),
            MIN_DURATION,
            MAX_DURATION,
        ));
    ocp.minimize_mayer(t)?;
    Ok(ocp.build()?)
}

/// Mayer objective, so the Hessian defaults to BFGS.
pub fn solver_config() -> SolverConfig {
    SolverConfig {
        max_iterations: 300,
        ..SolverConfig::default()
    }
}
