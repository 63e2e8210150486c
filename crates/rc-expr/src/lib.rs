//! Expression trees for dynamics, constraints and objectives.
//!
//! Symbolic quantities are plain values of the tagged [`Expr`] tree
//! (variable reference, constant, unary op, binary op). Arithmetic operators
//! only *build* trees; evaluation and first-order differentiation are
//! separate passes over the tree:
//!
//! - [`Expr::eval`] computes the value at a [`Point`]
//! - [`Expr::eval_gradient`] computes value and gradient with respect to
//!   `(x, u, p, t)` in one forward-mode sweep

pub mod error;
pub mod eval;
pub mod expr;
pub mod ops;

pub use error::{ExprError, ExprResult};
pub use eval::{Dims, Gradient, Point};
pub use expr::{BinaryOp, Expr, UnaryOp, Var};
