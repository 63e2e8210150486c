//! Objective formulations.

use nalgebra::{DMatrix, DVector};
use rc_expr::{Dims, Expr};

use crate::error::{OcpError, OcpResult};

/// Symmetric positive semi-definite weight of a least-squares residual.
#[derive(Clone, Debug, PartialEq)]
pub enum Weight {
    Diagonal(DVector<f64>),
    Full(DMatrix<f64>),
}

impl Weight {
    pub fn identity(dim: usize) -> Self {
        Weight::Diagonal(DVector::from_element(dim, 1.0))
    }

    pub fn dim(&self) -> usize {
        match self {
            Weight::Diagonal(d) => d.len(),
            Weight::Full(m) => m.nrows(),
        }
    }

    pub fn to_matrix(&self) -> DMatrix<f64> {
        match self {
            Weight::Diagonal(d) => DMatrix::from_diagonal(d),
            Weight::Full(m) => m.clone(),
        }
    }

    /// `W r`
    pub fn apply(&self, r: &DVector<f64>) -> DVector<f64> {
        match self {
            Weight::Diagonal(d) => d.component_mul(r),
            Weight::Full(m) => m * r,
        }
    }

    /// `½ rᵀ W r`
    pub fn half_norm(&self, r: &DVector<f64>) -> f64 {
        0.5 * r.dot(&self.apply(r))
    }

    pub(crate) fn validate(&self, what: &'static str, expected: usize) -> OcpResult<()> {
        if let Weight::Full(m) = self {
            if !m.is_square() {
                return Err(OcpError::InvalidWeight {
                    what,
                    reason: "matrix is not square",
                });
            }
        }
        if self.dim() != expected {
            return Err(OcpError::WeightDimension {
                what,
                expected,
                got: self.dim(),
            });
        }
        match self {
            Weight::Diagonal(d) => {
                if d.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(OcpError::InvalidWeight {
                        what,
                        reason: "diagonal entries must be finite and non-negative",
                    });
                }
            }
            Weight::Full(m) => {
                if m.iter().any(|w| !w.is_finite()) {
                    return Err(OcpError::InvalidWeight {
                        what,
                        reason: "entries must be finite",
                    });
                }
                let scale = m.amax().max(1.0);
                if (m - m.transpose()).amax() > 1e-12 * scale {
                    return Err(OcpError::InvalidWeight {
                        what,
                        reason: "matrix is not symmetric",
                    });
                }
                if m.nrows() > 0 && m.symmetric_eigenvalues().min() < -1e-10 * scale {
                    return Err(OcpError::InvalidWeight {
                        what,
                        reason: "matrix is not positive semi-definite",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Residual vector with its weight and reference: `½ (h - r)ᵀ W (h - r)`.
#[derive(Clone, Debug, PartialEq)]
pub struct LsqTerm {
    pub residuals: Vec<Expr>,
    pub weight: Weight,
    pub reference: DVector<f64>,
}

impl LsqTerm {
    /// Term with a zero reference.
    pub fn new(residuals: Vec<Expr>, weight: Weight) -> Self {
        let reference = DVector::zeros(residuals.len());
        Self {
            residuals,
            weight,
            reference,
        }
    }

    pub fn with_reference(mut self, reference: DVector<f64>) -> Self {
        self.reference = reference;
        self
    }

    pub fn dim(&self) -> usize {
        self.residuals.len()
    }

    fn validate(&self, what: &'static str, dims: Dims) -> OcpResult<()> {
        for r in &self.residuals {
            r.validate(dims)?;
        }
        self.weight.validate(what, self.dim())?;
        if self.reference.len() != self.dim() {
            return Err(OcpError::ReferenceDimension {
                what,
                expected: self.dim(),
                got: self.reference.len(),
            });
        }
        if self.reference.iter().any(|r| !r.is_finite()) {
            return Err(OcpError::InvalidWeight {
                what,
                reason: "reference must be finite",
            });
        }
        Ok(())
    }
}

/// Mesh nodes on which the stage term is evaluated.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum NodeSelection {
    /// Start node of every interval, `0..N`.
    #[default]
    Intervals,
    /// Every node including the last, `0..=N`.
    AllNodes,
    /// Explicit node indices in `0..=N`.
    Nodes(Vec<usize>),
}

impl NodeSelection {
    pub fn resolve(&self, intervals: usize) -> Vec<usize> {
        match self {
            NodeSelection::Intervals => (0..intervals).collect(),
            NodeSelection::AllNodes => (0..=intervals).collect(),
            NodeSelection::Nodes(nodes) => nodes.clone(),
        }
    }
}

/// Least-squares objective: stage term on selected nodes plus end term.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LeastSquares {
    pub stage: Option<LsqTerm>,
    pub nodes: NodeSelection,
    pub end: Option<LsqTerm>,
}

impl LeastSquares {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, term: LsqTerm) -> Self {
        self.stage = Some(term);
        self
    }

    pub fn on_nodes(mut self, nodes: NodeSelection) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn end(mut self, term: LsqTerm) -> Self {
        self.end = Some(term);
        self
    }
}

/// Exactly one active formulation per problem.
#[derive(Clone, Debug, PartialEq)]
pub enum Objective {
    /// `φ(x(tf), p)`
    Mayer(Expr),
    LeastSquares(LeastSquares),
}

impl Objective {
    pub fn is_least_squares(&self) -> bool {
        matches!(self, Objective::LeastSquares(_))
    }

    pub(crate) fn validate(&self, dims: Dims, intervals: usize) -> OcpResult<()> {
        match self {
            Objective::Mayer(e) => {
                e.validate(dims)?;
                if e.depends_on_controls() {
                    return Err(OcpError::ControlDependence {
                        what: "Mayer term",
                    });
                }
            }
            Objective::LeastSquares(lsq) => {
                if lsq.stage.is_none() && lsq.end.is_none() {
                    return Err(OcpError::Missing {
                        what: "least-squares residuals",
                    });
                }
                if let Some(stage) = &lsq.stage {
                    stage.validate("stage residual", dims)?;
                    for node in lsq.nodes.resolve(intervals) {
                        if node > intervals {
                            return Err(OcpError::NodeOutOfRange {
                                node,
                                last: intervals,
                            });
                        }
                    }
                }
                if let Some(end) = &lsq.end {
                    end.validate("end residual", dims)?;
                    if end.residuals.iter().any(Expr::depends_on_controls) {
                        return Err(OcpError::ControlDependence {
                            what: "end residual",
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
