//! Solver phases, status values and the persisted iterate.

use nalgebra::{DMatrix, DVector};
use rc_nlp::NlpEval;
use rc_qp::{QpProblem, QpSolution};
use serde::{Deserialize, Serialize};

use crate::kkt::KktResidual;

/// Position of the SQP state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Linearize,
    SolveQp,
    Step,
    ConvergenceCheck,
    Converged,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Converged | Phase::Failed)
    }
}

/// Outcome of a solve or of an iteration budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Converged,
    /// The per-call iteration budget ran out before convergence; the iterate
    /// is usable and the solver can be resumed.
    InProgress,
    /// `max_iterations` exhausted; the iterate is usable.
    MaxIterations,
    QpInfeasible,
    QpUnbounded,
    NumericalFailure,
    /// Deadline expired between iterations.
    Cancelled,
}

impl SolveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SolveStatus::Converged => "converged",
            SolveStatus::InProgress => "in_progress",
            SolveStatus::MaxIterations => "max_iterations",
            SolveStatus::QpInfeasible => "qp_infeasible",
            SolveStatus::QpUnbounded => "qp_unbounded",
            SolveStatus::NumericalFailure => "numerical_failure",
            SolveStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal failures. A tick ending here holds the previous control.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            SolveStatus::MaxIterations
                | SolveStatus::QpInfeasible
                | SolveStatus::QpUnbounded
                | SolveStatus::NumericalFailure
        )
    }

    /// Whether the iterate left behind is a valid warm start.
    pub fn iterate_is_usable(self) -> bool {
        !matches!(
            self,
            SolveStatus::QpInfeasible | SolveStatus::QpUnbounded | SolveStatus::NumericalFailure
        )
    }
}

/// Iterate and bookkeeping carried between iterations and across ticks.
#[derive(Clone, Debug)]
pub struct SolverState {
    pub z: DVector<f64>,
    pub y_eq: DVector<f64>,
    pub y_ineq: DVector<f64>,
    /// BFGS approximation; zero for Gauss-Newton.
    pub hessian: DMatrix<f64>,
    /// Iterations since the last [`crate::SqpSolver::init`] or budget reset.
    pub iteration: usize,
    pub phase: Phase,
    pub status: Option<SolveStatus>,
    /// ℓ1 merit penalty.
    pub penalty: f64,
    /// Incremented on every mutation.
    pub version: u64,
    pub kkt: Option<KktResidual>,
    /// Last step length.
    pub step_length: f64,
    pub(crate) eval: Option<NlpEval>,
    pub(crate) qp: Option<QpProblem>,
    pub(crate) qp_solution: Option<QpSolution>,
    /// Test the KKT residual before the first iteration.
    pub(crate) check_on_init: bool,
}

impl SolverState {
    pub(crate) fn new(z: DVector<f64>, n_eq: usize, n_ineq: usize) -> Self {
        let n = z.len();
        Self {
            z,
            y_eq: DVector::zeros(n_eq),
            y_ineq: DVector::zeros(n_ineq),
            hessian: DMatrix::zeros(n, n),
            iteration: 0,
            phase: Phase::Init,
            status: None,
            penalty: 0.0,
            version: 0,
            kkt: None,
            step_length: 0.0,
            eval: None,
            qp: None,
            qp_solution: None,
            check_on_init: false,
        }
    }

    /// Objective at the current iterate, when it has been evaluated.
    pub fn objective(&self) -> Option<f64> {
        self.eval.as_ref().map(|e| e.objective)
    }

    pub fn constraint_violation(&self) -> Option<f64> {
        self.eval.as_ref().map(|e| e.constraint_violation())
    }

    pub(crate) fn touch(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub(crate) fn finish(&mut self, phase: Phase, status: SolveStatus) {
        self.phase = phase;
        self.status = Some(status);
        self.touch();
    }
}

/// Summary of a solve call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub status: SolveStatus,
    pub iterations: usize,
    pub objective: f64,
    pub kkt: f64,
    pub constraint_violation: f64,
    pub solve_time_s: f64,
}

impl SolveReport {
    pub fn converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}
