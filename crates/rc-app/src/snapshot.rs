//! Conversion of predicted trajectories into published snapshots.

use nalgebra::DVector;
use rc_nlp::Nlp;
use rc_results::{NamedValue, Series, SeriesKind, TrajectorySnapshot};

use crate::error::AppResult;

/// Snapshot of the trajectory encoded by `z`, one series per named symbol.
pub fn trajectory_snapshot(
    nlp: &Nlp,
    z: &DVector<f64>,
    time_s: f64,
    tick: Option<u64>,
    status: &str,
    objective: f64,
) -> AppResult<TrajectorySnapshot> {
    let traj = nlp.trajectory(z)?;
    let symbols = nlp.ocp().symbols();

    let column = |rows: &[DVector<f64>], i: usize| rows.iter().map(|r| r[i]).collect::<Vec<_>>();

    let mut series = Vec::new();
    for (i, name) in symbols.state_names().iter().enumerate() {
        series.push(Series {
            name: name.clone(),
            kind: SeriesKind::State,
            values: column(&traj.states, i),
        });
    }
    for (i, name) in symbols.control_names().iter().enumerate() {
        series.push(Series {
            name: name.clone(),
            kind: SeriesKind::Control,
            values: column(&traj.controls, i),
        });
    }
    for (i, inter) in symbols.intermediates().iter().enumerate() {
        series.push(Series {
            name: inter.name.clone(),
            kind: SeriesKind::Intermediate,
            values: column(&traj.intermediates, i),
        });
    }
    let params = symbols
        .param_names()
        .iter()
        .zip(traj.params.iter())
        .map(|(name, value)| NamedValue {
            name: name.clone(),
            value: *value,
        })
        .collect();

    Ok(TrajectorySnapshot {
        time_s,
        tick,
        status: status.to_string(),
        objective,
        node_times: traj.times,
        series,
        params,
    })
}
