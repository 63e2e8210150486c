//! Differential-drive ("tank") vehicle driven to a point on the x axis.
//!
//! States `x, y, theta, vl, vr` (track speeds), controls `al, ar` (track
//! accelerations).

use nalgebra::DVector;
use rc_ocp::{
    Constraint, ConstraintKind, LeastSquares, LsqTerm, Mesh, Ocp, OcpBuilder, Weight,
};
use rc_rti::RtiConfig;
use rc_sqp::SolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TankDriveParams {
    /// Distance between the tracks.
    pub track_width: f64,
    pub target_x: f64,
    pub horizon_s: f64,
    pub intervals: usize,
    pub max_acceleration: f64,
    /// Plant state at the first tick.
    pub initial_state: [f64; 5],
}

impl Default for TankDriveParams {
    fn default() -> Self {
        Self {
            track_width: 0.5,
            target_x: 2.0,
            horizon_s: 10.0,
            intervals: 20,
            max_acceleration: 1.0,
            initial_state: [0.0; 5],
        }
    }
}

impl TankDriveParams {
    /// Length of one mesh interval; the control period of the loop.
    pub fn interval_s(&self) -> f64 {
        self.horizon_s / self.intervals as f64
    }

    pub fn initial_state(&self) -> DVector<f64> {
        DVector::from_row_slice(&self.initial_state)
    }
}

pub fn build(params: &TankDriveParams) -> AppResult<Ocp> {
    if !(params.track_width > 0.0) {
        return Err(AppError::InvalidInput("track_width must be positive".to_string()));
    }
    let mut ocp = OcpBuilder::new();
    let x = ocp.state("x")?;
    let y = ocp.state("y")?;
    let theta = ocp.state("theta")?;
    let vl = ocp.state("vl")?;
    let vr = ocp.state("vr")?;
    let al = ocp.control("al")?;
    let ar = ocp.control("ar")?;
    let speed = ocp.intermediate("speed", 0.5 * (vl.clone() + vr.clone()))?;

    ocp.dot(&x, speed.clone() * theta.clone().cos())?;
    ocp.dot(&y, speed * theta.clone().sin())?;
    ocp.dot(&theta, (vr.clone() - vl.clone()) / params.track_width)?;
    ocp.dot(&vl, al.clone())?;
    ocp.dot(&vr, ar.clone())?;
    ocp.horizon(0.0, params.horizon_s)?;
    ocp.mesh(Mesh::uniform(params.intervals)?);

    let a_max = params.max_acceleration;
    let states = [&x, &y, &theta, &vl, &vr];
    for (state, value) in states.into_iter().zip(params.initial_state) {
        ocp.subject_to(Constraint::equal(ConstraintKind::AtStart, state.clone(), value));
    }
    ocp.subject_to(Constraint::bounded(ConstraintKind::Path, al.clone(), -a_max, a_max))
        .subject_to(Constraint::bounded(ConstraintKind::Path, ar.clone(), -a_max, a_max));

    let target = DVector::from_vec(vec![params.target_x, 0.0, 0.0, 0.0, 0.0]);
    let stage = LsqTerm::new(
        vec![
            x.clone(),
            y.clone(),
            theta.clone(),
            vl.clone(),
            vr.clone(),
            al,
            ar,
        ],
        Weight::Diagonal(DVector::from_vec(vec![1.0, 1.0, 1.0, 0.1, 0.1, 0.01, 0.01])),
    )
    .with_reference(DVector::from_vec(vec![
        params.target_x,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ]));
    let end = LsqTerm::new(
        vec![x, y, theta, vl, vr],
        Weight::Diagonal(DVector::from_element(5, 10.0)),
    )
    .with_reference(target);
    ocp.minimize_least_squares(LeastSquares::new().stage(stage).end(end))?;
    Ok(ocp.build()?)
}

/// Least-squares objective, so the Hessian defaults to Gauss-Newton.
pub fn solver_config() -> SolverConfig {
    SolverConfig::default()
}

pub fn rti_config(params: &TankDriveParams) -> RtiConfig {
    RtiConfig {
        control_period: params.interval_s(),
        iterations_per_tick: 1,
        deadline_ms: None,
    }
}
