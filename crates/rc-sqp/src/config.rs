//! Solver configuration.

use rc_model::IntegratorType;
use rc_nlp::{Transcription, TranscriptionOptions};
use rc_ocp::Objective;
use rc_qp::QpSettings;
use serde::{Deserialize, Serialize};

use crate::error::{SqpError, SqpResult};

/// Hessian approximation of the QP subproblems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HessianApproximation {
    /// `JᵀWJ` of the least-squares residual.
    GaussNewton,
    /// Damped BFGS update of the Lagrangian Hessian.
    Bfgs,
}

/// Backtracking on the ℓ1 merit function.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchConfig {
    /// Take full steps when disabled.
    pub enabled: bool,
    /// Step reduction factor per backtrack.
    pub beta: f64,
    /// Armijo sufficient decrease constant.
    pub armijo: f64,
    /// Smallest step tried before giving up.
    pub min_step: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            beta: 0.5,
            armijo: 1e-4,
            min_step: 1e-6,
        }
    }
}

/// Immutable solver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub integrator: IntegratorType,
    /// Integrator sub-steps per mesh interval.
    pub integrator_steps: usize,
    pub transcription: Transcription,
    /// `None` selects Gauss-Newton for least-squares objectives and BFGS
    /// otherwise.
    pub hessian: Option<HessianApproximation>,
    /// KKT tolerance.
    pub tolerance: f64,
    /// Iteration budget per solve.
    pub max_iterations: usize,
    pub line_search: LineSearchConfig,
    /// Diagonal shift added to every QP Hessian.
    pub hessian_regularization: f64,
    pub qp: QpSettings,
    pub parallel_integration: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            integrator: IntegratorType::Rk4,
            integrator_steps: 4,
            transcription: Transcription::MultipleShooting,
            hessian: None,
            tolerance: 1e-6,
            max_iterations: 100,
            line_search: LineSearchConfig::default(),
            hessian_regularization: 1e-8,
            qp: QpSettings::default(),
            parallel_integration: false,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> SqpResult<()> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(SqpError::Config {
                what: "tolerance must be positive and finite",
            });
        }
        if self.max_iterations == 0 {
            return Err(SqpError::Config {
                what: "max_iterations must be positive",
            });
        }
        if self.integrator_steps == 0 {
            return Err(SqpError::Config {
                what: "integrator_steps must be positive",
            });
        }
        if !(self.hessian_regularization >= 0.0 && self.hessian_regularization.is_finite()) {
            return Err(SqpError::Config {
                what: "hessian_regularization must be non-negative",
            });
        }
        let ls = &self.line_search;
        if !(ls.beta > 0.0 && ls.beta < 1.0) {
            return Err(SqpError::Config {
                what: "line_search.beta must lie in (0, 1)",
            });
        }
        if !(ls.armijo > 0.0 && ls.armijo < 1.0) {
            return Err(SqpError::Config {
                what: "line_search.armijo must lie in (0, 1)",
            });
        }
        if !(ls.min_step > 0.0 && ls.min_step <= 1.0) {
            return Err(SqpError::Config {
                what: "line_search.min_step must lie in (0, 1]",
            });
        }
        if !(self.qp.tolerance > 0.0) || self.qp.max_iterations == 0 {
            return Err(SqpError::Config {
                what: "qp tolerance and max_iterations must be positive",
            });
        }
        Ok(())
    }

    /// Hessian approximation used for `objective`.
    pub fn resolve_hessian(&self, objective: &Objective) -> SqpResult<HessianApproximation> {
        match (self.hessian, objective.is_least_squares()) {
            (Some(HessianApproximation::GaussNewton), false) => Err(SqpError::Config {
                what: "Gauss-Newton requires a least-squares objective",
            }),
            (Some(h), _) => Ok(h),
            (None, true) => Ok(HessianApproximation::GaussNewton),
            (None, false) => Ok(HessianApproximation::Bfgs),
        }
    }

    pub fn transcription_options(&self) -> TranscriptionOptions {
        TranscriptionOptions {
            mode: self.transcription,
            integrator: self.integrator,
            steps: self.integrator_steps,
            parallel: self.parallel_integration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rc_ocp::LeastSquares;

    #[test]
    fn defaults_are_valid() {
        assert!(SolverConfig::default().validate().is_ok());
    }

    #[test]
    fn non_positive_tolerance_rejected() {
        let cfg = SolverConfig {
            tolerance: 0.0,
            ..SolverConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = SolverConfig {
            tolerance: f64::NAN,
            ..SolverConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = SolverConfig {
            max_iterations: 0,
            ..SolverConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hessian_defaults_follow_objective() {
        let cfg = SolverConfig::default();
        let lsq = Objective::LeastSquares(LeastSquares::new());
        let mayer = Objective::Mayer(rc_expr::Expr::param(0));
        assert_eq!(
            cfg.resolve_hessian(&lsq).unwrap(),
            HessianApproximation::GaussNewton
        );
        assert_eq!(
            cfg.resolve_hessian(&mayer).unwrap(),
            HessianApproximation::Bfgs
        );
        let gn = SolverConfig {
            hessian: Some(HessianApproximation::GaussNewton),
            ..cfg
        };
        assert!(gn.resolve_hessian(&mayer).is_err());
        let bfgs = SolverConfig {
            hessian: Some(HessianApproximation::Bfgs),
            ..SolverConfig::default()
        };
        assert_eq!(
            bfgs.resolve_hessian(&lsq).unwrap(),
            HessianApproximation::Bfgs
        );
    }

    #[test]
    fn yaml_round_trip_with_partial_input() {
        let cfg: SolverConfig =
            serde_yaml::from_str("tolerance: 1.0e-8\nhessian: bfgs\ntranscription: single_shooting\n")
                .unwrap();
        assert_eq!(cfg.tolerance, 1e-8);
        assert_eq!(cfg.hessian, Some(HessianApproximation::Bfgs));
        assert_eq!(cfg.transcription, Transcription::SingleShooting);
        assert_eq!(cfg.max_iterations, 100);
    }
}
