//! Differential equations backed by expression trees.

use std::collections::BTreeMap;

use nalgebra::DVector;
use rc_expr::{Dims, Expr, Point};

use crate::error::{ModelError, ModelResult};
use crate::model::{DynamicsModel, RhsJacobian};
use crate::symbols::SymbolTable;

/// Map from state index to its time derivative, filled one state at a time.
#[derive(Clone, Debug, Default)]
pub struct DifferentialEquation {
    rhs: BTreeMap<usize, Expr>,
}

impl DifferentialEquation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `d/dt state = rhs`. `state` must be a bare state reference.
    pub fn define(&mut self, state: &Expr, rhs: Expr, symbols: &SymbolTable) -> ModelResult<()> {
        let index = match state.as_var() {
            Some(rc_expr::Var::State(i)) if i < symbols.dims().nx => i,
            _ => {
                return Err(ModelError::InvalidArg {
                    what: "left-hand side of a differential equation must be a declared state",
                });
            }
        };
        if self.rhs.contains_key(&index) {
            return Err(ModelError::DuplicateEquation {
                state: symbols.state_names()[index].clone(),
            });
        }
        self.rhs.insert(index, rhs);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    /// Check coverage and references, then compile into a model.
    pub fn into_model(self, symbols: &SymbolTable) -> ModelResult<OdeModel> {
        let dims = symbols.dims();
        let mut rhs = self.rhs;
        let mut ordered = Vec::with_capacity(dims.nx);
        for (i, name) in symbols.state_names().iter().enumerate() {
            match rhs.remove(&i) {
                Some(expr) => ordered.push(expr),
                None => {
                    return Err(ModelError::MissingEquation {
                        state: name.clone(),
                    });
                }
            }
        }
        OdeModel::new(dims, ordered)
    }
}

/// Vector field given by one expression per state.
#[derive(Clone, Debug, PartialEq)]
pub struct OdeModel {
    dims: Dims,
    rhs: Vec<Expr>,
}

impl OdeModel {
    pub fn new(dims: Dims, rhs: Vec<Expr>) -> ModelResult<Self> {
        if rhs.len() != dims.nx {
            return Err(ModelError::DimensionMismatch {
                what: "right-hand side",
                expected: dims.nx,
                got: rhs.len(),
            });
        }
        for e in &rhs {
            e.validate(dims)?;
        }
        Ok(Self { dims, rhs })
    }

    pub fn expressions(&self) -> &[Expr] {
        &self.rhs
    }

    fn check_point(&self, pt: &Point<'_>) -> ModelResult<()> {
        let got = pt.dims();
        for (what, expected, got) in [
            ("state", self.dims.nx, got.nx),
            ("control", self.dims.nu, got.nu),
            ("parameter", self.dims.np, got.np),
        ] {
            if expected != got {
                return Err(ModelError::DimensionMismatch {
                    what,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }
}

impl DynamicsModel for OdeModel {
    fn dims(&self) -> Dims {
        self.dims
    }

    fn rhs(&self, pt: &Point<'_>) -> ModelResult<DVector<f64>> {
        self.check_point(pt)?;
        Ok(DVector::from_iterator(
            self.dims.nx,
            self.rhs.iter().map(|e| e.eval(pt)),
        ))
    }

    fn rhs_jacobian(&self, pt: &Point<'_>) -> ModelResult<RhsJacobian> {
        self.check_point(pt)?;
        let d = self.dims;
        let mut out = RhsJacobian::zeros(d);
        for (i, e) in self.rhs.iter().enumerate() {
            let g = e.eval_gradient(pt);
            out.value[i] = g.value;
            for j in 0..d.nx {
                out.dx[(i, j)] = g.grad[j];
            }
            for j in 0..d.nu {
                out.du[(i, j)] = g.grad[d.nx + j];
            }
            for j in 0..d.np {
                out.dp[(i, j)] = g.grad[d.nx + d.nu + j];
            }
            out.dt[i] = g.dt(d);
        }
        Ok(out)
    }
}
