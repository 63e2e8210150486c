//! Discretization mesh over the normalized horizon `[0, 1]`.

use crate::error::{OcpError, OcpResult};

/// Ordered intervals partitioning `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    points: Vec<f64>,
}

impl Mesh {
    /// `n` equal intervals.
    pub fn uniform(intervals: usize) -> OcpResult<Self> {
        if intervals == 0 {
            return Err(OcpError::InvalidMesh {
                what: "at least one interval is required",
            });
        }
        let n = intervals as f64;
        let points = (0..=intervals).map(|k| k as f64 / n).collect();
        Ok(Self { points })
    }

    /// Intervals proportional to the given positive fractions.
    pub fn from_fractions(fractions: &[f64]) -> OcpResult<Self> {
        if fractions.is_empty() {
            return Err(OcpError::InvalidMesh {
                what: "at least one interval is required",
            });
        }
        if fractions.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(OcpError::InvalidMesh {
                what: "interval fractions must be finite and positive",
            });
        }
        let total: f64 = fractions.iter().sum();
        let mut points = Vec::with_capacity(fractions.len() + 1);
        let mut acc = 0.0;
        points.push(0.0);
        for f in fractions {
            acc += f;
            points.push(acc / total);
        }
        if let Some(last) = points.last_mut() {
            *last = 1.0;
        }
        Ok(Self { points })
    }

    pub fn intervals(&self) -> usize {
        self.points.len() - 1
    }

    pub fn nodes(&self) -> usize {
        self.points.len()
    }

    /// Normalized node positions `s_0 = 0 < ... < s_N = 1`.
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Normalized span of interval `k`.
    pub fn span(&self, k: usize) -> (f64, f64) {
        (self.points[k], self.points[k + 1])
    }

    /// Length of interval `k` as a fraction of the horizon.
    pub fn fraction(&self, k: usize) -> f64 {
        self.points[k + 1] - self.points[k]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_mesh_points() {
        let m = Mesh::uniform(4).unwrap();
        assert_eq!(m.intervals(), 4);
        assert_eq!(m.nodes(), 5);
        assert_eq!(m.points(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(m.span(1), (0.25, 0.5));
    }

    #[test]
    fn fractions_are_normalized() {
        let m = Mesh::from_fractions(&[1.0, 1.0, 2.0]).unwrap();
        assert_eq!(m.points(), &[0.0, 0.25, 0.5, 1.0]);
        assert!((m.fraction(2) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn invalid_meshes() {
        assert!(Mesh::uniform(0).is_err());
        assert!(Mesh::from_fractions(&[]).is_err());
        assert!(Mesh::from_fractions(&[1.0, 0.0]).is_err());
        assert!(Mesh::from_fractions(&[1.0, f64::NAN]).is_err());
    }
}
