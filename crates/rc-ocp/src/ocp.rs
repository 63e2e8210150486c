//! Validated optimal control problem.

use rc_expr::Dims;
use rc_model::{OdeModel, SymbolTable, TimeMap};

use crate::constraint::{Constraint, ConstraintKind};
use crate::mesh::Mesh;
use crate::objective::Objective;

/// Immutable problem produced by [`crate::OcpBuilder::build`].
#[derive(Clone, Debug)]
pub struct Ocp {
    pub(crate) symbols: SymbolTable,
    pub(crate) model: OdeModel,
    pub(crate) time: TimeMap,
    pub(crate) mesh: Mesh,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) objective: Objective,
}

impl Ocp {
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn dims(&self) -> Dims {
        self.symbols.dims()
    }

    pub fn model(&self) -> &OdeModel {
        &self.model
    }

    pub fn time(&self) -> &TimeMap {
        &self.time
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraints_of(&self, kind: ConstraintKind) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Copy of the problem on a different mesh.
    pub fn with_mesh(&self, mesh: Mesh) -> Self {
        Self {
            mesh,
            ..self.clone()
        }
    }
}
