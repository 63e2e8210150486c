//! Incremental problem builder.

use rc_expr::{Expr, Var};
use rc_model::{DifferentialEquation, SymbolTable, TimeMap};

use crate::constraint::Constraint;
use crate::error::{OcpError, OcpResult};
use crate::mesh::Mesh;
use crate::objective::{LeastSquares, Objective};
use crate::ocp::Ocp;

/// Builder for constructing an optimal control problem incrementally.
///
/// Declare symbols, dynamics, constraints and the objective, then call
/// `build()` to validate and freeze everything into an immutable [`Ocp`].
#[derive(Debug, Default)]
pub struct OcpBuilder {
    symbols: SymbolTable,
    equations: DifferentialEquation,
    time: Option<TimeMap>,
    mesh: Option<Mesh>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl OcpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a differential state and return its expression handle.
    pub fn state(&mut self, name: &str) -> OcpResult<Expr> {
        Ok(self.symbols.add_state(name)?)
    }

    pub fn control(&mut self, name: &str) -> OcpResult<Expr> {
        Ok(self.symbols.add_control(name)?)
    }

    pub fn parameter(&mut self, name: &str) -> OcpResult<Expr> {
        Ok(self.symbols.add_param(name)?)
    }

    /// Register a named intermediate expression.
    pub fn intermediate(&mut self, name: &str, expr: Expr) -> OcpResult<Expr> {
        Ok(self.symbols.add_intermediate(name, expr)?)
    }

    /// Define `d/dt state = rhs`.
    pub fn dot(&mut self, state: &Expr, rhs: Expr) -> OcpResult<&mut Self> {
        self.equations.define(state, rhs, &self.symbols)?;
        Ok(self)
    }

    /// Horizon `[t0, tf]` with a fixed end time.
    pub fn horizon(&mut self, t0: f64, tf: f64) -> OcpResult<&mut Self> {
        if !(t0.is_finite() && tf.is_finite() && tf > t0) {
            return Err(OcpError::InvalidHorizon {
                what: "end time must be finite and after start time",
            });
        }
        self.time = Some(TimeMap::fixed(t0, tf - t0));
        Ok(self)
    }

    /// Horizon `[t0, t0 + T]` whose length `T` is a declared parameter.
    pub fn free_horizon(&mut self, t0: f64, length: &Expr) -> OcpResult<&mut Self> {
        if !t0.is_finite() {
            return Err(OcpError::InvalidHorizon {
                what: "start time must be finite",
            });
        }
        match length.as_var() {
            Some(Var::Param(i)) if i < self.symbols.dims().np => {
                self.time = Some(TimeMap::free(t0, i));
                Ok(self)
            }
            _ => Err(OcpError::InvalidHorizon {
                what: "free horizon length must be a declared parameter",
            }),
        }
    }

    pub fn mesh(&mut self, mesh: Mesh) -> &mut Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn subject_to(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push(constraint);
        self
    }

    pub fn minimize_mayer(&mut self, expr: Expr) -> OcpResult<&mut Self> {
        self.set_objective(Objective::Mayer(expr))
    }

    pub fn minimize_least_squares(&mut self, lsq: LeastSquares) -> OcpResult<&mut Self> {
        self.set_objective(Objective::LeastSquares(lsq))
    }

    fn set_objective(&mut self, objective: Objective) -> OcpResult<&mut Self> {
        if self.objective.is_some() {
            return Err(OcpError::ObjectiveAlreadySet);
        }
        self.objective = Some(objective);
        Ok(self)
    }

    /// Validate and freeze the problem.
    pub fn build(self) -> OcpResult<Ocp> {
        let dims = self.symbols.dims();
        if dims.nx == 0 {
            return Err(OcpError::Missing {
                what: "differential states",
            });
        }
        let time = self.time.ok_or(OcpError::Missing { what: "horizon" })?;
        let mesh = self.mesh.ok_or(OcpError::Missing { what: "mesh" })?;
        let objective = self.objective.ok_or(OcpError::Missing { what: "objective" })?;

        for c in &self.constraints {
            c.expr.validate(dims)?;
            if !c.bounds_feasible() {
                return Err(OcpError::InfeasibleBounds {
                    what: c.to_string(),
                    lower: c.lower,
                    upper: c.upper,
                });
            }
        }
        objective.validate(dims, mesh.intervals())?;
        let model = self.equations.into_model(&self.symbols)?;

        tracing::debug!(
            states = dims.nx,
            controls = dims.nu,
            params = dims.np,
            intervals = mesh.intervals(),
            constraints = self.constraints.len(),
            "built optimal control problem"
        );

        Ok(Ocp {
            symbols: self.symbols,
            model,
            time,
            mesh,
            constraints: self.constraints,
            objective,
        })
    }
}
