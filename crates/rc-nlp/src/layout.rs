//! Decision vector layout.

use serde::{Deserialize, Serialize};

/// Transcription mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transcription {
    SingleShooting,
    #[default]
    MultipleShooting,
}

/// Position of every block inside the decision vector `z`.
///
/// - multiple shooting: `[x_0, u_0, ..., x_{N-1}, u_{N-1}, x_N, p]`
/// - single shooting: `[x_0, u_0, ..., u_{N-1}, p]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub nx: usize,
    pub nu: usize,
    pub np: usize,
    pub intervals: usize,
    pub mode: Transcription,
}

impl Layout {
    pub fn len(&self) -> usize {
        self.param_offset() + self.np
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the free state at node `k`. Single shooting only has node 0.
    pub fn state_offset(&self, k: usize) -> Option<usize> {
        match self.mode {
            Transcription::MultipleShooting if k <= self.intervals => {
                Some(k * (self.nx + self.nu))
            }
            Transcription::SingleShooting if k == 0 => Some(0),
            _ => None,
        }
    }

    /// Offset of the control held on interval `k`.
    pub fn control_offset(&self, k: usize) -> usize {
        match self.mode {
            Transcription::MultipleShooting => k * (self.nx + self.nu) + self.nx,
            Transcription::SingleShooting => self.nx + k * self.nu,
        }
    }

    pub fn param_offset(&self) -> usize {
        match self.mode {
            Transcription::MultipleShooting => self.intervals * (self.nx + self.nu) + self.nx,
            Transcription::SingleShooting => self.nx + self.intervals * self.nu,
        }
    }

    /// Interval whose control applies at node `k`; the last node reuses the
    /// last interval's control.
    pub fn node_control(&self, k: usize) -> usize {
        k.min(self.intervals.saturating_sub(1))
    }

    /// Number of continuity equalities.
    pub fn continuity_rows(&self) -> usize {
        match self.mode {
            Transcription::MultipleShooting => self.intervals * self.nx,
            Transcription::SingleShooting => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(mode: Transcription) -> Layout {
        Layout {
            nx: 3,
            nu: 1,
            np: 1,
            intervals: 4,
            mode,
        }
    }

    #[test]
    fn multiple_shooting_offsets() {
        let l = layout(Transcription::MultipleShooting);
        assert_eq!(l.state_offset(0), Some(0));
        assert_eq!(l.control_offset(0), 3);
        assert_eq!(l.state_offset(1), Some(4));
        assert_eq!(l.state_offset(4), Some(16));
        assert_eq!(l.state_offset(5), None);
        assert_eq!(l.param_offset(), 19);
        assert_eq!(l.len(), 20);
        assert_eq!(l.continuity_rows(), 12);
    }

    #[test]
    fn single_shooting_offsets() {
        let l = layout(Transcription::SingleShooting);
        assert_eq!(l.state_offset(0), Some(0));
        assert_eq!(l.state_offset(1), None);
        assert_eq!(l.control_offset(2), 5);
        assert_eq!(l.param_offset(), 7);
        assert_eq!(l.len(), 8);
        assert_eq!(l.continuity_rows(), 0);
    }

    #[test]
    fn last_node_uses_last_control() {
        let l = layout(Transcription::MultipleShooting);
        assert_eq!(l.node_control(3), 3);
        assert_eq!(l.node_control(4), 3);
    }
}
