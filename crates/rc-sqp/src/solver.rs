//! SQP state machine.
//!
//! One iteration walks `Linearize → SolveQp → Step → ConvergenceCheck`.
//! [`SqpSolver::advance`] performs a single phase transition so callers can
//! observe the machine; [`SqpSolver::iterate`] and [`SqpSolver::solve`] drive
//! it under an iteration budget and an optional deadline.

use nalgebra::{DMatrix, DVector};
use rc_core::{Deadline, Timer, inf_norm};
use rc_nlp::{Nlp, NlpEval};
use rc_ocp::Ocp;
use rc_qp::{InteriorPoint, QpProblem, QpSolver, QpStatus};
use tracing::{debug, info, warn};

use crate::config::{HessianApproximation, SolverConfig};
use crate::error::{SqpError, SqpResult};
use crate::hessian::{damped_bfgs_update, regularize};
use crate::kkt::{KktResidual, lagrangian_gradient};
use crate::line_search::{StepLength, backtrack, merit};
use crate::state::{Phase, SolveReport, SolveStatus, SolverState};

/// Starting point of a solve.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialGuess {
    /// [`Nlp::initial_guess`].
    Default,
    /// Primal point with zero multipliers.
    Primal(DVector<f64>),
    /// Primal point and multipliers from an earlier solve.
    WarmStart {
        z: DVector<f64>,
        y_eq: DVector<f64>,
        y_ineq: DVector<f64>,
    },
}

/// Margin of the merit penalty over the largest multiplier.
const PENALTY_MARGIN: f64 = 1.1;

pub struct SqpSolver {
    nlp: Nlp,
    config: SolverConfig,
    hessian: HessianApproximation,
    qp_solver: Box<dyn QpSolver>,
    state: SolverState,
}

impl SqpSolver {
    /// Validate the configuration, transcribe `ocp` and start from the
    /// default guess.
    pub fn new(ocp: Ocp, config: SolverConfig) -> SqpResult<Self> {
        config.validate()?;
        let hessian = config.resolve_hessian(ocp.objective())?;
        let nlp = Nlp::new(ocp, config.transcription_options())?;
        let qp_solver: Box<dyn QpSolver> = Box::new(InteriorPoint::new(config.qp));
        let state = SolverState::new(nlp.initial_guess(), nlp.num_eq(), nlp.num_ineq());
        let mut solver = Self {
            nlp,
            config,
            hessian,
            qp_solver,
            state,
        };
        solver.reset_hessian();
        Ok(solver)
    }

    /// Replace the QP kernel.
    pub fn with_qp_solver(mut self, qp_solver: Box<dyn QpSolver>) -> Self {
        self.qp_solver = qp_solver;
        self
    }

    pub fn nlp(&self) -> &Nlp {
        &self.nlp
    }

    /// Replace the start constraints by `x_0 = x̂` (or restore them with
    /// `None`). Multipliers are reset when the equality count changes.
    pub fn embed_initial_state(&mut self, state: Option<DVector<f64>>) -> SqpResult<()> {
        self.nlp.set_initial_state(state)?;
        self.fit_multipliers();
        self.invalidate();
        Ok(())
    }

    /// Move the horizon so that it starts at `t0`.
    pub fn set_start_time(&mut self, t0: f64) {
        self.nlp.set_start_time(t0);
        self.invalidate();
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn hessian_approximation(&self) -> HessianApproximation {
        self.hessian
    }

    pub fn state(&self) -> &SolverState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Restore a state captured with [`SqpSolver::state`].
    pub fn restore(&mut self, state: SolverState) -> SqpResult<()> {
        let expected = self.nlp.num_variables();
        if state.z.len() != expected {
            return Err(SqpError::DimensionMismatch {
                what: "primal iterate",
                expected,
                got: state.z.len(),
            });
        }
        let version = self.state.version;
        self.state = state;
        self.state.version = version.wrapping_add(1);
        self.fit_multipliers();
        Ok(())
    }

    /// Start over from `guess`.
    pub fn init(&mut self, guess: InitialGuess) -> SqpResult<()> {
        let (z, multipliers) = match guess {
            InitialGuess::Default => (self.nlp.initial_guess(), None),
            InitialGuess::Primal(z) => (z, None),
            InitialGuess::WarmStart { z, y_eq, y_ineq } => (z, Some((y_eq, y_ineq))),
        };
        let version = self.state.version;
        let mut state = SolverState::new(z, self.nlp.num_eq(), self.nlp.num_ineq());
        if let Some((y_eq, y_ineq)) = multipliers {
            state.y_eq = y_eq;
            state.y_ineq = y_ineq;
            state.check_on_init = true;
        }
        self.check_dims(&state.z, &state.y_eq, &state.y_ineq)?;
        state.version = version.wrapping_add(1);
        self.state = state;
        self.reset_hessian();
        Ok(())
    }

    /// Continue from a new primal point, keeping the Hessian approximation.
    ///
    /// Multipliers are reset to zero and the iteration counter restarts.
    pub fn resume(&mut self, z: DVector<f64>) -> SqpResult<()> {
        let expected = self.nlp.num_variables();
        if z.len() != expected {
            return Err(SqpError::DimensionMismatch {
                what: "primal iterate",
                expected,
                got: z.len(),
            });
        }
        self.state.z = z;
        self.state.y_eq.fill(0.0);
        self.state.y_ineq.fill(0.0);
        self.state.iteration = 0;
        self.state.status = None;
        self.state.kkt = None;
        self.state.check_on_init = false;
        self.state.phase = Phase::Linearize;
        self.invalidate();
        Ok(())
    }

    /// Control applied over the first interval of the current iterate.
    pub fn first_control(&self) -> DVector<f64> {
        self.nlp.control_at(&self.state.z, 0)
    }

    /// Iterate until convergence or failure.
    pub fn solve(&mut self) -> SqpResult<SolveReport> {
        self.solve_until(&Deadline::never())
    }

    /// Iterate until convergence, failure or `deadline`.
    pub fn solve_until(&mut self, deadline: &Deadline) -> SqpResult<SolveReport> {
        let report = self.iterate(usize::MAX, deadline)?;
        info!(
            status = ?report.status,
            iterations = report.iterations,
            objective = report.objective,
            kkt = report.kkt,
            "SQP solve finished"
        );
        Ok(report)
    }

    /// Run at most `budget` iterations.
    ///
    /// The deadline is checked between iterations; the iterate stays valid
    /// on expiry. A budget exhausted before convergence reports
    /// [`SolveStatus::InProgress`] and the solver can be resumed.
    pub fn iterate(&mut self, budget: usize, deadline: &Deadline) -> SqpResult<SolveReport> {
        let timer = Timer::start("sqp");
        let start = self.state.iteration;
        if !self.state.phase.is_terminal() {
            self.state.status = None;
        }

        loop {
            match self.state.phase {
                Phase::Converged | Phase::Failed => break,
                Phase::Linearize => {
                    if self.state.iteration - start >= budget {
                        self.state.status = Some(SolveStatus::InProgress);
                        self.state.touch();
                        break;
                    }
                    if deadline.expired() {
                        debug!(iteration = self.state.iteration, "SQP deadline expired");
                        self.state.status = Some(SolveStatus::Cancelled);
                        self.state.touch();
                        break;
                    }
                }
                _ => {}
            }
            self.advance()?;
        }

        Ok(self.report(self.state.iteration - start, timer.stop()))
    }

    /// Perform one phase transition and return the new phase.
    pub fn advance(&mut self) -> SqpResult<Phase> {
        match self.state.phase {
            Phase::Init => self.initialize()?,
            Phase::Linearize => self.linearize()?,
            Phase::SolveQp => self.solve_qp()?,
            Phase::Step => self.take_step()?,
            Phase::ConvergenceCheck => self.check_convergence(),
            Phase::Converged | Phase::Failed => {}
        }
        Ok(self.state.phase)
    }

    fn initialize(&mut self) -> SqpResult<()> {
        if self.state.check_on_init {
            self.state.check_on_init = false;
            let Some(eval) = self.evaluate(&self.state.z)? else {
                self.state.finish(Phase::Failed, SolveStatus::NumericalFailure);
                return Ok(());
            };
            let kkt = KktResidual::compute(&eval, &self.state.y_eq, &self.state.y_ineq);
            self.state.kkt = Some(kkt);
            self.state.eval = Some(eval);
            if kkt.max() <= self.config.tolerance {
                debug!(kkt = kkt.max(), "warm start already optimal");
                self.state.finish(Phase::Converged, SolveStatus::Converged);
                return Ok(());
            }
        }
        self.state.phase = Phase::Linearize;
        self.state.touch();
        Ok(())
    }

    fn linearize(&mut self) -> SqpResult<()> {
        let n = self.nlp.num_variables();
        let eval = match self.state.eval.take() {
            Some(eval) if eval.gradient.len() == n => eval,
            _ => match self.evaluate(&self.state.z)? {
                Some(eval) => eval,
                None => {
                    self.state.finish(Phase::Failed, SolveStatus::NumericalFailure);
                    return Ok(());
                }
            },
        };

        let mut h = match self.hessian {
            HessianApproximation::GaussNewton => eval
                .residual
                .as_ref()
                .map(|r| r.gauss_newton_hessian())
                .ok_or(SqpError::Config {
                    what: "Gauss-Newton requires a least-squares objective",
                })?,
            HessianApproximation::Bfgs => self.state.hessian.clone(),
        };
        regularize(&mut h, self.config.hessian_regularization);

        let qp = QpProblem::unconstrained(h, eval.gradient.clone())
            .with_equalities(eval.eq_jacobian.clone(), -&eval.eq)
            .with_inequalities(
                eval.ineq_jacobian.clone(),
                &eval.ineq_lower - &eval.ineq,
                &eval.ineq_upper - &eval.ineq,
            );

        self.state.eval = Some(eval);
        self.state.qp = Some(qp);
        self.state.qp_solution = None;
        self.state.phase = Phase::SolveQp;
        self.state.touch();
        Ok(())
    }

    fn solve_qp(&mut self) -> SqpResult<()> {
        let Some(qp) = self.state.qp.take() else {
            self.state.phase = Phase::Linearize;
            self.state.touch();
            return Ok(());
        };
        let solution = self.qp_solver.solve(&qp)?;
        debug!(
            iteration = self.state.iteration,
            status = ?solution.status,
            qp_iterations = solution.iterations,
            step_norm = inf_norm(&solution.x),
            "QP subproblem solved"
        );

        match solution.status {
            QpStatus::Optimal => {}
            QpStatus::MaxIterations => {
                if !solution.x.iter().all(|v| v.is_finite()) {
                    self.state.finish(Phase::Failed, SolveStatus::NumericalFailure);
                    return Ok(());
                }
                warn!(
                    iteration = self.state.iteration,
                    "QP kernel hit its iteration limit, using its last iterate"
                );
            }
            QpStatus::Infeasible => {
                self.state.finish(Phase::Failed, SolveStatus::QpInfeasible);
                return Ok(());
            }
            QpStatus::Unbounded => {
                self.state.finish(Phase::Failed, SolveStatus::QpUnbounded);
                return Ok(());
            }
        }

        self.state.qp_solution = Some(solution);
        self.state.phase = Phase::Step;
        self.state.touch();
        Ok(())
    }

    fn take_step(&mut self) -> SqpResult<()> {
        let (Some(eval), Some(qp_sol)) = (self.state.eval.take(), self.state.qp_solution.take())
        else {
            self.state.phase = Phase::Linearize;
            self.state.touch();
            return Ok(());
        };
        let dz = &qp_sol.x;

        let y_max = inf_norm(&qp_sol.y_eq).max(inf_norm(&qp_sol.y_ineq));
        self.state.penalty = self.state.penalty.max(PENALTY_MARGIN * y_max);
        let penalty = self.state.penalty;

        let phi0 = merit(&eval, penalty);
        let slope = eval.gradient.dot(dz) - penalty * eval.l1_violation();
        let z = &self.state.z;
        let nlp = &self.nlp;
        // A step at the noise level of the QP cannot show a merit decrease.
        let step = if inf_norm(dz) <= self.config.tolerance {
            Some(StepLength {
                alpha: 1.0,
                sufficient_decrease: true,
                trials: 0,
            })
        } else {
            backtrack(&self.config.line_search, phi0, slope, |alpha| {
                let trial = z + dz * alpha;
                nlp.evaluate_values(&trial).ok().map(|e| merit(&e, penalty))
            })
        };
        let Some(step) = step else {
            self.state.eval = Some(eval);
            self.state.finish(Phase::Failed, SolveStatus::NumericalFailure);
            return Ok(());
        };
        if !step.sufficient_decrease {
            warn!(
                iteration = self.state.iteration,
                alpha = step.alpha,
                "line search found no sufficient decrease, taking minimal step"
            );
        }

        let alpha = step.alpha;
        let z_new = &self.state.z + dz * alpha;
        // Multipliers jump to the subproblem's regardless of the primal step.
        let y_eq = qp_sol.y_eq.clone();
        let y_ineq = qp_sol.y_ineq.clone();

        let Some(eval_new) = self.evaluate(&z_new)? else {
            self.state.eval = Some(eval);
            self.state.finish(Phase::Failed, SolveStatus::NumericalFailure);
            return Ok(());
        };

        if self.hessian == HessianApproximation::Bfgs {
            let s = &z_new - &self.state.z;
            let dy = lagrangian_gradient(&eval_new, &y_eq, &y_ineq)
                - lagrangian_gradient(&eval, &y_eq, &y_ineq);
            if !damped_bfgs_update(&mut self.state.hessian, &s, &dy) {
                debug!(iteration = self.state.iteration, "BFGS update skipped");
            }
        }

        self.state.iteration += 1;
        debug!(
            iteration = self.state.iteration,
            objective = eval_new.objective,
            violation = eval_new.constraint_violation(),
            alpha,
            trials = step.trials,
            "SQP step"
        );

        self.state.z = z_new;
        self.state.y_eq = y_eq;
        self.state.y_ineq = y_ineq;
        self.state.eval = Some(eval_new);
        self.state.step_length = alpha;
        self.state.phase = Phase::ConvergenceCheck;
        self.state.touch();
        Ok(())
    }

    fn check_convergence(&mut self) {
        let Some(eval) = self.state.eval.as_ref() else {
            self.state.phase = Phase::Linearize;
            self.state.touch();
            return;
        };
        let kkt = KktResidual::compute(eval, &self.state.y_eq, &self.state.y_ineq);
        self.state.kkt = Some(kkt);
        debug!(
            iteration = self.state.iteration,
            stationarity = kkt.stationarity,
            primal = kkt.primal,
            dual = kkt.dual,
            complementarity = kkt.complementarity,
            "KKT residual"
        );

        if kkt.max() <= self.config.tolerance {
            self.state.finish(Phase::Converged, SolveStatus::Converged);
        } else if self.state.iteration >= self.config.max_iterations {
            self.state.finish(Phase::Failed, SolveStatus::MaxIterations);
        } else {
            self.state.phase = Phase::Linearize;
            self.state.touch();
        }
    }

    /// Full evaluation; `None` on non-finite results.
    fn evaluate(&self, z: &DVector<f64>) -> SqpResult<Option<NlpEval>> {
        match self.nlp.evaluate(z) {
            Ok(eval) => Ok(Some(eval)),
            Err(e) if e.is_numerical_failure() => {
                debug!(error = %e, "NLP evaluation failed");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn invalidate(&mut self) {
        self.state.eval = None;
        self.state.qp = None;
        self.state.qp_solution = None;
        if matches!(self.state.phase, Phase::SolveQp | Phase::Step | Phase::ConvergenceCheck) {
            self.state.phase = Phase::Linearize;
        }
        self.state.touch();
    }

    fn fit_multipliers(&mut self) {
        let (n_eq, n_ineq) = (self.nlp.num_eq(), self.nlp.num_ineq());
        if self.state.y_eq.len() != n_eq || self.state.y_ineq.len() != n_ineq {
            self.state.y_eq = DVector::zeros(n_eq);
            self.state.y_ineq = DVector::zeros(n_ineq);
            self.state.eval = None;
            self.state.kkt = None;
        }
    }

    fn reset_hessian(&mut self) {
        let n = self.nlp.num_variables();
        self.state.hessian = match self.hessian {
            HessianApproximation::Bfgs => DMatrix::identity(n, n),
            HessianApproximation::GaussNewton => DMatrix::zeros(n, n),
        };
    }

    fn check_dims(&self, z: &DVector<f64>, y_eq: &DVector<f64>, y_ineq: &DVector<f64>) -> SqpResult<()> {
        for (what, expected, got) in [
            ("primal iterate", self.nlp.num_variables(), z.len()),
            ("equality multipliers", self.nlp.num_eq(), y_eq.len()),
            ("inequality multipliers", self.nlp.num_ineq(), y_ineq.len()),
        ] {
            if expected != got {
                return Err(SqpError::DimensionMismatch { what, expected, got });
            }
        }
        Ok(())
    }

    fn report(&self, iterations: usize, solve_time_s: f64) -> SolveReport {
        SolveReport {
            status: self.state.status.unwrap_or(SolveStatus::InProgress),
            iterations,
            objective: self.state.objective().unwrap_or(f64::NAN),
            kkt: self.state.kkt.map(|k| k.max()).unwrap_or(f64::INFINITY),
            constraint_violation: self.state.constraint_violation().unwrap_or(f64::INFINITY),
            solve_time_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_expr::Expr;
    use rc_ocp::{Constraint, ConstraintKind, LeastSquares, LsqTerm, Mesh, OcpBuilder, Weight};
    use rc_qp::{QpResult, QpSolution};

    /// x' = u, x(0) = 0, minimize ½Σ (u − 1)²
    fn ramp() -> Ocp {
        let mut b = OcpBuilder::new();
        let x = b.state("x").unwrap();
        let u = b.control("u").unwrap();
        b.dot(&x, u.clone()).unwrap();
        b.horizon(0.0, 2.0).unwrap();
        b.mesh(Mesh::uniform(4).unwrap());
        b.subject_to(Constraint::equal(ConstraintKind::AtStart, x, 0.0));
        let lsq = LeastSquares::new().stage(
            LsqTerm::new(vec![u], Weight::identity(1)).with_reference(DVector::from_vec(vec![1.0])),
        );
        b.minimize_least_squares(lsq).unwrap();
        b.build().unwrap()
    }

    struct Refusing;

    impl QpSolver for Refusing {
        fn solve(&self, qp: &QpProblem) -> QpResult<QpSolution> {
            Ok(QpSolution {
                x: DVector::zeros(qp.num_variables()),
                y_eq: DVector::zeros(qp.b_eq.len()),
                y_ineq: DVector::zeros(qp.lb.len()),
                status: QpStatus::Infeasible,
                iterations: 0,
            })
        }
    }

    #[test]
    fn phases_follow_the_iteration_order() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default()).unwrap();
        assert_eq!(solver.phase(), Phase::Init);
        assert_eq!(solver.advance().unwrap(), Phase::Linearize);
        assert_eq!(solver.advance().unwrap(), Phase::SolveQp);
        assert_eq!(solver.advance().unwrap(), Phase::Step);
        assert_eq!(solver.advance().unwrap(), Phase::ConvergenceCheck);
        assert_eq!(solver.advance().unwrap(), Phase::Converged);
        assert_eq!(solver.state().iteration, 1);
        assert_eq!(solver.advance().unwrap(), Phase::Converged);
    }

    #[test]
    fn version_increments_on_every_transition() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default()).unwrap();
        let mut last = solver.state().version;
        while !solver.phase().is_terminal() {
            solver.advance().unwrap();
            assert!(solver.state().version > last);
            last = solver.state().version;
        }
    }

    #[test]
    fn infeasible_subproblem_fails_the_solve() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default())
            .unwrap()
            .with_qp_solver(Box::new(Refusing));
        let report = solver.solve().unwrap();
        assert_eq!(report.status, SolveStatus::QpInfeasible);
        assert_eq!(solver.phase(), Phase::Failed);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn zero_budget_runs_nothing() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default()).unwrap();
        let report = solver.iterate(0, &Deadline::never()).unwrap();
        assert_eq!(report.status, SolveStatus::InProgress);
        assert_eq!(report.iterations, 0);
        assert_eq!(solver.phase(), Phase::Linearize);
    }

    #[test]
    fn expired_deadline_cancels_before_iterating() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default()).unwrap();
        let deadline = Deadline::after(std::time::Duration::ZERO);
        let report = solver.solve_until(&deadline).unwrap();
        assert_eq!(report.status, SolveStatus::Cancelled);
        assert_eq!(solver.state().iteration, 0);
        let report = solver.solve().unwrap();
        assert_eq!(report.status, SolveStatus::Converged);
    }

    #[test]
    fn wrong_guess_length_is_rejected() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default()).unwrap();
        let err = solver.init(InitialGuess::Primal(DVector::zeros(2))).unwrap_err();
        assert!(matches!(err, SqpError::DimensionMismatch { .. }));
    }

    #[test]
    fn gauss_newton_with_mayer_is_a_config_error() {
        let mut b = OcpBuilder::new();
        let x = b.state("x").unwrap();
        b.dot(&x, Expr::constant(1.0)).unwrap();
        b.horizon(0.0, 1.0).unwrap();
        b.mesh(Mesh::uniform(2).unwrap());
        b.minimize_mayer(x).unwrap();
        let ocp = b.build().unwrap();
        let config = SolverConfig {
            hessian: Some(HessianApproximation::GaussNewton),
            ..SolverConfig::default()
        };
        assert!(matches!(
            SqpSolver::new(ocp, config),
            Err(SqpError::Config { .. })
        ));
    }

    #[test]
    fn restore_rewinds_the_iterate() {
        let mut solver = SqpSolver::new(ramp(), SolverConfig::default()).unwrap();
        let snapshot = solver.state().clone();
        solver.solve().unwrap();
        assert_ne!(solver.state().z, snapshot.z);
        solver.restore(snapshot.clone()).unwrap();
        assert_eq!(solver.state().z, snapshot.z);
        assert_eq!(solver.phase(), Phase::Init);
    }
}
