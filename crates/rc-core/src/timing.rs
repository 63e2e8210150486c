//! Lightweight timing utilities.
//!
//! Stopwatches for measuring where solve time goes, plus a wall-clock
//! deadline used to bound real-time ticks.

use std::time::{Duration, Instant};

/// A simple timer that measures elapsed time.
pub struct Timer {
    label: &'static str,
    start: Instant,
}

impl Timer {
    /// Create and start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Elapsed time in seconds without stopping.
    pub fn elapsed_s(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and return elapsed time in seconds.
    pub fn stop(self) -> f64 {
        self.elapsed_s()
    }
}

/// Wall-clock deadline. `None` budget never expires.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn never() -> Self {
        Self { expires_at: None }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + budget),
        }
    }

    /// Deadline from an optional millisecond budget.
    pub fn from_millis(budget_ms: Option<f64>) -> Self {
        match budget_ms {
            Some(ms) if ms.is_finite() && ms >= 0.0 => Self::after(Duration::from_secs_f64(ms / 1e3)),
            _ => Self::never(),
        }
    }

    pub fn expired(&self) -> bool {
        match self.expires_at {
            Some(t) => Instant::now() >= t,
            None => false,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|t| t.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_deadline_does_not_expire() {
        let d = Deadline::from_millis(None);
        assert!(!d.expired());
        assert!(d.remaining().is_none());
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let d = Deadline::from_millis(Some(0.0));
        assert!(d.expired());
    }
}
