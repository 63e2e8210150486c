//! Run execution service.

use std::path::Path;
use std::time::Instant;

use nalgebra::DVector;
use rc_model::{SimOptions, simulate};
use rc_results::{
    MemorySink, PlotSink, RunManifest, RunStore, RunType, TrajectorySnapshot, compute_run_id,
    publish_or_log,
};
use rc_rti::{RealTimeDriver, TickOutput};
use rc_sqp::{SolveStatus, SqpSolver};
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::progress::{RunProgressEvent, RunStage};
use crate::scenario::Scenario;
use crate::snapshot::trajectory_snapshot;

pub const SOLVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How a run is driven.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunMode {
    /// One offline solve.
    Solve,
    /// Closed loop against a simulated plant.
    RealTime { ticks: usize },
}

/// Request to execute a run.
pub struct RunRequest<'a> {
    pub scenario: Scenario,
    pub mode: RunMode,
    pub config: AppConfig,
    /// Store the run under this directory.
    pub record_dir: Option<&'a Path>,
}

#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub build_time_s: f64,
    pub solve_time_s: f64,
    pub save_time_s: f64,
    pub total_time_s: f64,
    pub max_tick_time_s: f64,
}

/// Response from a run execution.
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: String,
    /// Final solve status, or that of the last tick.
    pub status: SolveStatus,
    pub objective: f64,
    pub iterations: usize,
    pub snapshots: Vec<TrajectorySnapshot>,
    pub ticks: Vec<TickOutput>,
    /// Plant state after the last tick.
    pub final_state: Option<DVector<f64>>,
    pub saved: bool,
    pub timing: RunTimingSummary,
}

impl RunResponse {
    pub fn failed_ticks(&self) -> usize {
        self.ticks.iter().filter(|t| t.failed).count()
    }
}

/// Identity of a run: scenario, mode and configuration.
#[derive(Serialize)]
struct RunKey<'a> {
    run_type: &'a RunType,
    config: &'a AppConfig,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    event: RunProgressEvent,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(event);
    }
}

/// Execute a run without progress reporting or extra sinks.
pub fn execute(request: &RunRequest) -> AppResult<RunResponse> {
    execute_with_progress(request, None, None)
}

/// Execute a run, streaming progress events and publishing every snapshot
/// to `sink` as well as collecting them in the response.
pub fn execute_with_progress(
    request: &RunRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
    mut sink: Option<&mut dyn PlotSink>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    request.config.validate()?;

    emit_progress(
        &mut progress_cb,
        RunProgressEvent::stage(request.mode, RunStage::BuildingProblem, 0.0, None),
    );
    let build_started = Instant::now();
    let ocp = request.scenario.build_ocp()?;
    let mut timing = RunTimingSummary {
        build_time_s: build_started.elapsed().as_secs_f64(),
        ..RunTimingSummary::default()
    };

    let mut memory = MemorySink::default();
    let mut publish = |snapshot: &TrajectorySnapshot| {
        publish_or_log(&mut memory, snapshot);
        if let Some(s) = sink.as_deref_mut() {
            publish_or_log(s, snapshot);
        }
    };

    let run_type;
    let mut response = match request.mode {
        RunMode::Solve => {
            run_type = RunType::Solve;
            emit_progress(
                &mut progress_cb,
                RunProgressEvent::stage(
                    request.mode,
                    RunStage::Solving,
                    started.elapsed().as_secs_f64(),
                    None,
                ),
            );
            let solve_started = Instant::now();
            let mut solver = SqpSolver::new(ocp, request.config.solver.clone())?;
            let report = solver.solve()?;
            timing.solve_time_s = solve_started.elapsed().as_secs_f64();

            let snapshot = trajectory_snapshot(
                solver.nlp(),
                &solver.state().z,
                0.0,
                None,
                report.status.as_str(),
                report.objective,
            )?;
            publish(&snapshot);
            RunResponse {
                run_id: String::new(),
                status: report.status,
                objective: report.objective,
                iterations: report.iterations,
                snapshots: Vec::new(),
                ticks: Vec::new(),
                final_state: None,
                saved: false,
                timing: RunTimingSummary::default(),
            }
        }
        RunMode::RealTime { ticks } => {
            run_type = RunType::RealTime {
                control_period_s: request.config.rti.control_period,
                ticks,
            };
            let mut x = request.scenario.plant_initial_state().ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "scenario '{}' has no closed-loop plant",
                    request.scenario
                ))
            })?;
            let plant = ocp.model().clone();
            let period = request.config.rti.control_period;
            let mut driver =
                RealTimeDriver::new(ocp, request.config.solver.clone(), request.config.rti.clone())?;

            let solve_started = Instant::now();
            let mut outputs = Vec::with_capacity(ticks);
            let mut iterations = 0;
            for k in 0..ticks {
                let t = k as f64 * period;
                let out = driver.tick(t, &x)?;
                iterations += out.iterations;
                timing.max_tick_time_s = timing.max_tick_time_s.max(out.elapsed_s);

                let snapshot = trajectory_snapshot(
                    driver.solver().nlp(),
                    &driver.solver().state().z,
                    t,
                    Some(k as u64),
                    out.status.as_str(),
                    out.objective,
                )?;
                publish(&snapshot);

                let p = driver.solver().nlp().params(&driver.solver().state().z);
                let opts = SimOptions {
                    t0: t,
                    sample_time: period,
                    steps_per_sample: request.config.solver.integrator_steps,
                    integrator: request.config.solver.integrator,
                };
                let record = simulate(&plant, &x, std::slice::from_ref(&out.control), &p, &opts)?;
                if let Some(next) = record.final_state() {
                    x = next.clone();
                }

                emit_progress(
                    &mut progress_cb,
                    RunProgressEvent {
                        ticks: Some((k + 1, ticks)),
                        objective: Some(out.objective),
                        ..RunProgressEvent::stage(
                            request.mode,
                            RunStage::Ticking,
                            started.elapsed().as_secs_f64(),
                            None,
                        )
                    },
                );
                outputs.push(out);
            }
            timing.solve_time_s = solve_started.elapsed().as_secs_f64();

            let (status, objective) = outputs
                .last()
                .map(|o| (o.status, o.objective))
                .unwrap_or((SolveStatus::InProgress, f64::NAN));
            RunResponse {
                run_id: String::new(),
                status,
                objective,
                iterations,
                snapshots: Vec::new(),
                ticks: outputs,
                final_state: Some(x),
                saved: false,
                timing: RunTimingSummary::default(),
            }
        }
    };

    response.snapshots = memory.snapshots;
    response.run_id = compute_run_id(
        request.scenario.name(),
        &RunKey {
            run_type: &run_type,
            config: &request.config,
        },
        SOLVER_VERSION,
    );

    if let Some(dir) = request.record_dir {
        emit_progress(
            &mut progress_cb,
            RunProgressEvent::stage(
                request.mode,
                RunStage::SavingResults,
                started.elapsed().as_secs_f64(),
                Some(format!("Saving run {}", response.run_id)),
            ),
        );
        let save_started = Instant::now();
        let store = RunStore::new(dir.to_path_buf())?;
        let manifest = RunManifest::now(
            response.run_id.clone(),
            request.scenario.name(),
            run_type,
            SOLVER_VERSION,
            response.status.as_str(),
        );
        store.save_run(&manifest, &response.snapshots)?;
        timing.save_time_s = save_started.elapsed().as_secs_f64();
        response.saved = true;
    }

    timing.total_time_s = started.elapsed().as_secs_f64();
    response.timing = timing;
    emit_progress(
        &mut progress_cb,
        RunProgressEvent::stage(
            request.mode,
            RunStage::Completed,
            started.elapsed().as_secs_f64(),
            None,
        ),
    );
    tracing::info!(
        scenario = request.scenario.name(),
        status = response.status.as_str(),
        objective = response.objective,
        total_time_s = response.timing.total_time_s,
        "run finished"
    );
    Ok(response)
}

/// List stored runs of a scenario, most recent first.
pub fn list_runs(record_dir: &Path, scenario: Scenario) -> AppResult<Vec<RunManifest>> {
    let store = RunStore::new(record_dir.to_path_buf())?;
    Ok(store.list_runs(scenario.name())?)
}

/// Load a stored run.
pub fn load_run(record_dir: &Path, run_id: &str) -> AppResult<(RunManifest, Vec<TrajectorySnapshot>)> {
    let store = RunStore::new(record_dir.to_path_buf())?;
    let manifest = store.load_manifest(run_id)?;
    let snapshots = store.load_snapshots(run_id)?;
    Ok((manifest, snapshots))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_tank_request(ticks: usize) -> RunRequest<'static> {
        RunRequest {
            scenario: Scenario::TankDrive,
            mode: RunMode::RealTime { ticks },
            config: Scenario::TankDrive.default_config(),
            record_dir: None,
        }
    }

    #[test]
    fn rocket_has_no_closed_loop() {
        let request = RunRequest {
            scenario: Scenario::Rocket,
            mode: RunMode::RealTime { ticks: 3 },
            config: Scenario::Rocket.default_config(),
            record_dir: None,
        };
        assert!(matches!(execute(&request), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let mut request = short_tank_request(1);
        request.config.rti.iterations_per_tick = 0;
        let mut events = Vec::new();
        let result = execute_with_progress(&request, Some(&mut |e| events.push(e)), None);
        assert!(matches!(result, Err(AppError::Config(_))));
        assert!(events.is_empty());
    }

    #[test]
    fn real_time_run_collects_one_snapshot_per_tick() {
        let response = execute(&short_tank_request(3)).unwrap();
        assert_eq!(response.ticks.len(), 3);
        assert_eq!(response.snapshots.len(), 3);
        for (k, snap) in response.snapshots.iter().enumerate() {
            assert_eq!(snap.tick, Some(k as u64));
        }
        assert_eq!(response.final_state.as_ref().map(|x| x.len()), Some(5));
        assert!(!response.saved);
        assert_eq!(response.failed_ticks(), 0);
    }

    #[test]
    fn run_id_depends_on_mode() {
        let a = execute(&short_tank_request(1)).unwrap();
        let b = execute(&short_tank_request(2)).unwrap();
        assert_ne!(a.run_id, b.run_id);
        let again = execute(&short_tank_request(1)).unwrap();
        assert_eq!(a.run_id, again.run_id);
    }

    #[test]
    fn extra_sink_sees_every_snapshot() {
        let mut sink = MemorySink::default();
        let response =
            execute_with_progress(&short_tank_request(2), None, Some(&mut sink)).unwrap();
        assert_eq!(sink.snapshots, response.snapshots);
    }
}
