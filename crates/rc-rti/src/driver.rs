//! Tick-driven receding-horizon loop.

use nalgebra::DVector;
use rc_core::{Deadline, Timer, Tolerances, nearly_equal};
use rc_nlp::NodeTrajectory;
use rc_ocp::Ocp;
use rc_sqp::{SolveStatus, SolverConfig, SolverState, SqpSolver};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::SampleClock;
use crate::config::RtiConfig;
use crate::error::{RtiError, RtiResult};

/// Result of one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    pub time: f64,
    /// The control is the previously applied one when set.
    pub failed: bool,
    pub objective: f64,
    pub control: DVector<f64>,
    pub status: SolveStatus,
    pub iterations: usize,
    pub kkt: f64,
    pub elapsed_s: f64,
}

/// Solver state at the start of a tick, used to replay that tick.
#[derive(Clone, Debug)]
struct TickSnapshot {
    time: f64,
    previous_time: Option<f64>,
    state: SolverState,
    last_control: DVector<f64>,
}

pub struct RealTimeDriver {
    solver: SqpSolver,
    config: RtiConfig,
    clock: SampleClock,
    last_time: Option<f64>,
    last_control: DVector<f64>,
    snapshot: Option<TickSnapshot>,
    ticks: u64,
}

impl RealTimeDriver {
    pub fn new(ocp: Ocp, solver_config: SolverConfig, config: RtiConfig) -> RtiResult<Self> {
        Self::from_solver(SqpSolver::new(ocp, solver_config)?, config)
    }

    /// Drive an existing solver, e.g. one warm started by an offline solve.
    pub fn from_solver(solver: SqpSolver, config: RtiConfig) -> RtiResult<Self> {
        config.validate()?;
        let clock = SampleClock::new(config.control_period)?;
        let last_control = solver.first_control();
        Ok(Self {
            solver,
            config,
            clock,
            last_time: None,
            last_control,
            snapshot: None,
            ticks: 0,
        })
    }

    pub fn solver(&self) -> &SqpSolver {
        &self.solver
    }

    pub fn config(&self) -> &RtiConfig {
        &self.config
    }

    pub fn clock(&self) -> &SampleClock {
        &self.clock
    }

    /// Control applied by the last successful tick.
    pub fn last_control(&self) -> &DVector<f64> {
        &self.last_control
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Predicted trajectory of the current iterate.
    pub fn trajectory(&self) -> RtiResult<NodeTrajectory> {
        Ok(self.solver.nlp().trajectory(&self.solver.state().z)?)
    }

    /// Run one control tick at `time` with the measured plant state.
    ///
    /// Calling again with the same `time` replays the tick from its starting
    /// state, so identical inputs give identical outputs.
    pub fn tick(&mut self, time: f64, measured: &DVector<f64>) -> RtiResult<TickOutput> {
        let timer = Timer::start("rti_tick");
        if !time.is_finite() {
            return Err(RtiError::NonFinite { what: "tick time" });
        }
        let nx = self.solver.nlp().layout().nx;
        if measured.len() != nx {
            return Err(RtiError::StateDimension {
                expected: nx,
                got: measured.len(),
            });
        }
        if measured.iter().any(|v| !v.is_finite()) {
            return Err(RtiError::NonFinite {
                what: "measured state",
            });
        }

        let replay = self
            .snapshot
            .as_ref()
            .filter(|s| nearly_equal(s.time, time, Tolerances::default()))
            .cloned();
        if let Some(snap) = replay {
            debug!(time, "replaying tick");
            self.solver.restore(snap.state.clone())?;
            self.last_control = snap.last_control.clone();
            self.last_time = snap.previous_time;
        } else {
            if let Some(last) = self.last_time {
                if time < last {
                    return Err(RtiError::TimeWentBackwards { time, last });
                }
            }
            self.snapshot = Some(TickSnapshot {
                time,
                previous_time: self.last_time,
                state: self.solver.state().clone(),
                last_control: self.last_control.clone(),
            });
        }

        self.prepare(time, measured)?;

        let deadline = Deadline::from_millis(self.config.deadline_ms);
        let report = self
            .solver
            .iterate(self.config.iterations_per_tick, &deadline)?;

        let failed = report.status.is_failure();
        let control = if failed {
            warn!(time, status = ?report.status, "tick failed, holding previous control");
            self.last_control.clone()
        } else {
            let u = self.solver.first_control();
            self.last_control = u.clone();
            u
        };

        self.last_time = Some(time);
        self.clock.mark(time);
        self.ticks += 1;

        let out = TickOutput {
            time,
            failed,
            objective: report.objective,
            control,
            status: report.status,
            iterations: report.iterations,
            kkt: report.kkt,
            elapsed_s: timer.stop(),
        };
        debug!(
            time,
            objective = out.objective,
            kkt = out.kkt,
            status = ?out.status,
            "tick finished"
        );
        Ok(out)
    }

    /// Shift the warm start and embed the measurement.
    fn prepare(&mut self, time: f64, measured: &DVector<f64>) -> RtiResult<()> {
        match self.last_time {
            Some(last) if time > last => {
                let periods = self.clock.periods_between(last, time);
                let shifted = self.solver.nlp().shift(&self.solver.state().z, periods)?;
                self.solver.resume(shifted)?;
            }
            _ => {
                if self.solver.phase().is_terminal() {
                    let z = self.solver.state().z.clone();
                    self.solver.resume(z)?;
                }
            }
        }
        self.solver.set_start_time(time);
        self.solver.embed_initial_state(Some(measured.clone()))?;
        Ok(())
    }
}
