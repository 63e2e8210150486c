//! Control-period bookkeeping.

use crate::error::{RtiError, RtiResult};

/// Tells when the next tick is due.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleClock {
    period: f64,
    next_due: Option<f64>,
}

impl SampleClock {
    pub fn new(period: f64) -> RtiResult<Self> {
        if !(period > 0.0 && period.is_finite()) {
            return Err(RtiError::Config {
                what: "control period must be positive and finite",
            });
        }
        Ok(Self {
            period,
            next_due: None,
        })
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn next_due(&self) -> Option<f64> {
        self.next_due
    }

    /// A tick is due at the first call and once a full period has elapsed.
    pub fn is_due(&self, now: f64) -> bool {
        match self.next_due {
            None => true,
            Some(due) => now >= due - 1e-9 * self.period,
        }
    }

    /// Record a tick at `now`.
    pub fn mark(&mut self, now: f64) {
        self.next_due = Some(now + self.period);
    }

    /// Whole periods between two tick times, at least one.
    pub fn periods_between(&self, from: f64, to: f64) -> usize {
        let periods = ((to - from) / self.period).round();
        if periods >= 1.0 { periods as usize } else { 1 }
    }
}
