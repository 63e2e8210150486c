//! Dynamics models and numerical integration for the NMPC core.
//!
//! Provides:
//! - Symbol table (states, controls, parameters, intermediates)
//! - Differential equations compiled into an expression-backed [`OdeModel`]
//! - Explicit Runge-Kutta integrators with exact first-order sensitivities
//! - Forward simulation for plant models and initial guesses

pub mod error;
pub mod integrator;
pub mod jacobian;
pub mod model;
pub mod ode;
pub mod sim;
pub mod symbols;
pub mod time;

pub use error::{ModelError, ModelResult};
pub use integrator::{IntegratorType, IntervalResult, RungeKutta, Tableau, integrate_interval};
pub use jacobian::{
    DifferenceScheme, central_difference_jacobian, difference_jacobian, finite_difference_jacobian,
};
pub use model::{DynamicsModel, RhsJacobian};
pub use ode::{DifferentialEquation, OdeModel};
pub use sim::{SimOptions, SimRecord, simulate};
pub use symbols::{Intermediate, SymbolTable};
pub use time::{HorizonLength, TimeMap};
