//! Continuous-time optimal control problem definition.
//!
//! An [`Ocp`] aggregates symbols, dynamics, horizon, mesh, constraints and
//! objective. It can only be obtained from [`OcpBuilder::build`], which
//! rejects malformed problems before any numerical work happens.

pub mod builder;
pub mod constraint;
pub mod error;
pub mod mesh;
pub mod objective;
pub mod ocp;

pub use builder::OcpBuilder;
pub use constraint::{Constraint, ConstraintKind};
pub use error::{OcpError, OcpResult};
pub use mesh::Mesh;
pub use objective::{LeastSquares, LsqTerm, NodeSelection, Objective, Weight};
pub use ocp::Ocp;
