use serde::{Deserialize, Serialize};

use crate::error::{RtiError, RtiResult};

/// Real-time loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtiConfig {
    /// Seconds between ticks. Should equal the length of one mesh interval
    /// so that a shift moves the horizon by exactly one block.
    pub control_period: f64,
    /// SQP iterations per tick.
    pub iterations_per_tick: usize,
    /// Wall-clock budget per tick in milliseconds.
    pub deadline_ms: Option<f64>,
}

impl Default for RtiConfig {
    fn default() -> Self {
        Self {
            control_period: 0.5,
            iterations_per_tick: 1,
            deadline_ms: None,
        }
    }
}

impl RtiConfig {
    pub fn validate(&self) -> RtiResult<()> {
        if !(self.control_period > 0.0 && self.control_period.is_finite()) {
            return Err(RtiError::Config {
                what: "control_period must be positive and finite",
            });
        }
        if self.iterations_per_tick == 0 {
            return Err(RtiError::Config {
                what: "iterations_per_tick must be positive",
            });
        }
        if let Some(ms) = self.deadline_ms {
            if !(ms >= 0.0 && ms.is_finite()) {
                return Err(RtiError::Config {
                    what: "deadline_ms must be non-negative",
                });
            }
        }
        Ok(())
    }
}
