//! End-to-end runs of the built-in scenarios.

use rc_app::rocket::{DISTANCE, MAX_DURATION, MAX_THRUST, MIN_DURATION, VELOCITY_BOUNDS};
use rc_app::{AppConfig, RunMode, RunRequest, Scenario, execute};
use rc_sqp::SolveStatus;

const BOUND_TOL: f64 = 1e-5;

#[test]
fn rocket_reaches_target_within_bounds() {
    let request = RunRequest {
        scenario: Scenario::Rocket,
        mode: RunMode::Solve,
        config: Scenario::Rocket.default_config(),
        record_dir: None,
    };
    let response = execute(&request).expect("rocket solve failed");
    assert_eq!(response.status, SolveStatus::Converged);
    assert!(response.iterations > 0);

    let snap = &response.snapshots[0];
    let duration = snap.params[0].value;
    assert_eq!(snap.params[0].name, "T");
    assert!((MIN_DURATION - BOUND_TOL..=MAX_DURATION + BOUND_TOL).contains(&duration));
    assert!((response.objective - duration).abs() < 1e-9);

    let s = &snap.series("s").expect("s series").values;
    let v = &snap.series("v").expect("v series").values;
    let u = &snap.series("u").expect("u series").values;
    assert!(s[0].abs() < BOUND_TOL);
    assert!((s[s.len() - 1] - DISTANCE).abs() < 1e-4);
    assert!(v[v.len() - 1].abs() < 1e-4);
    for vi in v {
        assert!(*vi >= VELOCITY_BOUNDS.0 - BOUND_TOL && *vi <= VELOCITY_BOUNDS.1 + BOUND_TOL);
    }
    for ui in u {
        assert!(ui.abs() <= MAX_THRUST + BOUND_TOL);
    }
    let end_time = snap.node_times[snap.node_times.len() - 1];
    assert!((end_time - duration).abs() < 1e-9);
}

#[test]
fn tank_drive_closed_loop_settles_at_target() {
    let ticks = 20;
    let request = RunRequest {
        scenario: Scenario::TankDrive,
        mode: RunMode::RealTime { ticks },
        config: Scenario::TankDrive.default_config(),
        record_dir: None,
    };
    let response = execute(&request).expect("closed loop failed");
    assert_eq!(response.ticks.len(), ticks);
    assert_eq!(response.failed_ticks(), 0);

    let objectives: Vec<f64> = response.ticks.iter().map(|t| t.objective).collect();
    let scale = objectives[0].abs().max(1.0);
    for pair in objectives[3..].windows(2) {
        assert!(
            pair[1] <= pair[0] + 1e-3 * scale,
            "objective rose from {} to {}",
            pair[0],
            pair[1]
        );
    }
    assert!(objectives[ticks - 1] < objectives[0]);

    let x = response.final_state.expect("plant state");
    assert!((x[0] - 2.0).abs() < 0.2, "x ended at {}", x[0]);
    assert!(x[1].abs() < 1e-6);
    assert!(x[2].abs() < 1e-6);

    for (k, tick) in response.ticks.iter().enumerate() {
        assert!((tick.time - 0.5 * k as f64).abs() < 1e-12);
        assert!(tick.control.iter().all(|a| a.abs() <= 1.0 + BOUND_TOL));
    }
}

#[test]
fn yaml_config_drives_the_solve() {
    let config: AppConfig = serde_yaml::from_str(
        "solver:\n  hessian: bfgs\n  max_iterations: 2\n  transcription: single_shooting\n",
    )
    .unwrap();
    let request = RunRequest {
        scenario: Scenario::TankDrive,
        mode: RunMode::Solve,
        config,
        record_dir: None,
    };
    let response = execute(&request).unwrap();
    assert!(response.iterations <= 2);
    assert!(matches!(
        response.status,
        SolveStatus::Converged | SolveStatus::MaxIterations
    ));
}
