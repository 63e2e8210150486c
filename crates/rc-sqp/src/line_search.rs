//! ℓ1 merit function and Armijo backtracking.

use rc_nlp::NlpEval;

use crate::config::LineSearchConfig;

/// `f(z) + ν ‖c(z)‖₁`
pub fn merit(eval: &NlpEval, penalty: f64) -> f64 {
    eval.objective + penalty * eval.l1_violation()
}

/// Accepted step of a backtracking search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepLength {
    pub alpha: f64,
    /// `false` when no trial met the Armijo condition and the smallest finite
    /// trial was taken instead.
    pub sufficient_decrease: bool,
    pub trials: usize,
}

/// Backtrack from a full step.
///
/// `trial(α)` returns the merit value at `z + αΔz`, or `None` when the point
/// could not be evaluated. `slope` is the directional derivative of the merit
/// at `α = 0`; positive slopes are clipped to zero. Returns `None` when every
/// trial was non-finite.
pub fn backtrack<F>(config: &LineSearchConfig, phi0: f64, slope: f64, mut trial: F) -> Option<StepLength>
where
    F: FnMut(f64) -> Option<f64>,
{
    let slope = slope.min(0.0);
    // rounding slack so that a zero step is never rejected
    let slack = 16.0 * f64::EPSILON * (1.0 + phi0.abs());
    let mut alpha = 1.0;
    let mut trials = 0;
    let mut smallest_finite = None;

    loop {
        trials += 1;
        if let Some(phi) = trial(alpha).filter(|v| v.is_finite()) {
            if !config.enabled || phi <= phi0 + config.armijo * alpha * slope + slack {
                return Some(StepLength {
                    alpha,
                    sufficient_decrease: true,
                    trials,
                });
            }
            smallest_finite = Some(alpha);
        } else if !config.enabled {
            return None;
        }

        let next = alpha * config.beta;
        if next < config.min_step {
            break;
        }
        alpha = next;
    }

    smallest_finite.map(|alpha| StepLength {
        alpha,
        sufficient_decrease: false,
        trials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LineSearchConfig {
        LineSearchConfig::default()
    }

    #[test]
    fn full_step_accepted_on_quadratic() {
        // φ(α) = (1 − α)², slope −2
        let step = backtrack(&cfg(), 1.0, -2.0, |a| Some((1.0 - a) * (1.0 - a))).unwrap();
        assert_eq!(step.alpha, 1.0);
        assert!(step.sufficient_decrease);
        assert_eq!(step.trials, 1);
    }

    #[test]
    fn overshoot_is_halved() {
        // φ(α) = (1 − 3α)², minimum at 1/3
        let step = backtrack(&cfg(), 1.0, -6.0, |a| Some((1.0 - 3.0 * a).powi(2))).unwrap();
        assert_eq!(step.alpha, 0.5);
        assert!(step.sufficient_decrease);
    }

    #[test]
    fn non_finite_trials_are_rejected() {
        let step = backtrack(&cfg(), 1.0, -2.0, |a| if a > 0.3 { None } else { Some(1.0 - a) }).unwrap();
        assert_eq!(step.alpha, 0.25);
        assert!(step.sufficient_decrease);
    }

    #[test]
    fn falls_back_to_smallest_finite_step() {
        let step = backtrack(&cfg(), 1.0, -1.0, |_| Some(2.0)).unwrap();
        assert!(!step.sufficient_decrease);
        assert!(step.alpha < 2.0 * cfg().min_step);
        assert!(step.alpha >= cfg().min_step);
    }

    #[test]
    fn all_non_finite_gives_none() {
        assert!(backtrack(&cfg(), 1.0, -1.0, |_| Some(f64::NAN)).is_none());
    }

    #[test]
    fn disabled_search_takes_full_step() {
        let config = LineSearchConfig {
            enabled: false,
            ..cfg()
        };
        let step = backtrack(&config, 1.0, -1.0, |_| Some(5.0)).unwrap();
        assert_eq!(step.alpha, 1.0);
        assert!(backtrack(&config, 1.0, -1.0, |_| None).is_none());
    }
}
