//! Recording runs and streaming progress.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use rc_app::{
    RunMode, RunProgressEvent, RunRequest, RunStage, Scenario, execute_with_progress, list_runs,
    load_run,
};
use rc_results::{JsonlSink, RunType};

fn unique_temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("rc_app_{name}_{nanos}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn real_time_run_is_recorded_and_reloadable() {
    let dir = unique_temp_dir("record");
    let request = RunRequest {
        scenario: Scenario::TankDrive,
        mode: RunMode::RealTime { ticks: 4 },
        config: Scenario::TankDrive.default_config(),
        record_dir: Some(&dir),
    };

    let mut events: Vec<RunProgressEvent> = Vec::new();
    let jsonl_path = dir.join("live.jsonl");
    let mut sink = JsonlSink::create(&jsonl_path).unwrap();
    let response =
        execute_with_progress(&request, Some(&mut |e| events.push(e)), Some(&mut sink)).unwrap();
    assert!(response.saved);

    let runs = list_runs(&dir, Scenario::TankDrive).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, response.run_id);

    let (manifest, snapshots) = load_run(&dir, &response.run_id).unwrap();
    assert_eq!(manifest.scenario, "tank-drive");
    assert_eq!(manifest.status, response.status.as_str());
    assert!(matches!(manifest.run_type, RunType::RealTime { ticks: 4, .. }));
    assert_eq!(snapshots, response.snapshots);

    let live = std::fs::read_to_string(&jsonl_path).unwrap();
    assert_eq!(live.lines().count(), 4);

    let ticking: Vec<_> = events
        .iter()
        .filter(|e| e.stage == RunStage::Ticking)
        .filter_map(|e| e.ticks)
        .collect();
    assert_eq!(ticking, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    assert_eq!(events.first().map(|e| e.stage), Some(RunStage::BuildingProblem));
    assert_eq!(events.last().map(|e| e.stage), Some(RunStage::Completed));
    assert!(events.iter().any(|e| e.stage == RunStage::SavingResults));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn solve_without_record_dir_saves_nothing() {
    let request = RunRequest {
        scenario: Scenario::TankDrive,
        mode: RunMode::Solve,
        config: Scenario::TankDrive.default_config(),
        record_dir: None,
    };
    let mut events = Vec::new();
    let response = execute_with_progress(&request, Some(&mut |e| events.push(e)), None).unwrap();
    assert!(!response.saved);
    assert_eq!(response.snapshots.len(), 1);
    assert!(response.timing.total_time_s >= response.timing.solve_time_s);
    assert!(events.iter().any(|e: &RunProgressEvent| e.stage == RunStage::Solving));
    assert!(!events.iter().any(|e| e.stage == RunStage::SavingResults));
}
