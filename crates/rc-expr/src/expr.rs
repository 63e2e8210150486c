//! Expression tree definition.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ExprError, ExprResult};
use crate::eval::Dims;

/// Reference to a decision or independent variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Var {
    /// Differential state `x[i]`.
    State(usize),
    /// Control `u[i]`.
    Control(usize),
    /// Time-invariant parameter `p[i]`.
    Param(usize),
    /// Absolute time `t`.
    Time,
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Var::State(i) => write!(f, "x{i}"),
            Var::Control(i) => write!(f, "u{i}"),
            Var::Param(i) => write!(f, "p{i}"),
            Var::Time => write!(f, "t"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Sin,
    Cos,
    Tan,
    Tanh,
    Exp,
    Ln,
    Sqrt,
}

impl UnaryOp {
    pub fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Sin => a.sin(),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Tanh => a.tanh(),
            UnaryOp::Exp => a.exp(),
            UnaryOp::Ln => a.ln(),
            UnaryOp::Sqrt => a.sqrt(),
        }
    }

    /// Derivative of the operation at `a`.
    pub fn derivative(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -1.0,
            UnaryOp::Sin => a.cos(),
            UnaryOp::Cos => -a.sin(),
            UnaryOp::Tan => {
                let c = a.cos();
                1.0 / (c * c)
            }
            UnaryOp::Tanh => {
                let th = a.tanh();
                1.0 - th * th
            }
            UnaryOp::Exp => a.exp(),
            UnaryOp::Ln => 1.0 / a,
            UnaryOp::Sqrt => 0.5 / a.sqrt(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Exp => "exp",
            UnaryOp::Ln => "ln",
            UnaryOp::Sqrt => "sqrt",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }
}

/// Scalar expression over `(x, u, p, t)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Var(Var),
    Const(f64),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn state(index: usize) -> Self {
        Expr::Var(Var::State(index))
    }

    pub fn control(index: usize) -> Self {
        Expr::Var(Var::Control(index))
    }

    pub fn param(index: usize) -> Self {
        Expr::Var(Var::Param(index))
    }

    pub fn time() -> Self {
        Expr::Var(Var::Time)
    }

    pub fn constant(value: f64) -> Self {
        Expr::Const(value)
    }

    /// Build a unary node, folding constants.
    pub fn unary(op: UnaryOp, a: Expr) -> Self {
        match a {
            Expr::Const(v) => Expr::Const(op.apply(v)),
            other => Expr::Unary(op, Box::new(other)),
        }
    }

    /// Build a binary node, folding constants and trivial identities.
    pub fn binary(op: BinaryOp, a: Expr, b: Expr) -> Self {
        match (op, a.const_value(), b.const_value()) {
            (_, Some(x), Some(y)) => Expr::Const(op.apply(x, y)),
            (BinaryOp::Add, Some(z), _) if z == 0.0 => b,
            (BinaryOp::Add | BinaryOp::Sub, _, Some(z)) if z == 0.0 => a,
            (BinaryOp::Mul, Some(one), _) if one == 1.0 => b,
            (BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow, _, Some(one)) if one == 1.0 => a,
            _ => Expr::Binary(op, Box::new(a), Box::new(b)),
        }
    }

    pub fn const_value(&self) -> Option<f64> {
        match self {
            Expr::Const(v) => Some(*v),
            _ => None,
        }
    }

    pub fn sin(self) -> Self {
        Expr::unary(UnaryOp::Sin, self)
    }

    pub fn cos(self) -> Self {
        Expr::unary(UnaryOp::Cos, self)
    }

    pub fn tan(self) -> Self {
        Expr::unary(UnaryOp::Tan, self)
    }

    pub fn tanh(self) -> Self {
        Expr::unary(UnaryOp::Tanh, self)
    }

    pub fn exp(self) -> Self {
        Expr::unary(UnaryOp::Exp, self)
    }

    pub fn ln(self) -> Self {
        Expr::unary(UnaryOp::Ln, self)
    }

    pub fn sqrt(self) -> Self {
        Expr::unary(UnaryOp::Sqrt, self)
    }

    pub fn powf(self, exponent: f64) -> Self {
        Expr::binary(BinaryOp::Pow, self, Expr::Const(exponent))
    }

    pub fn pow(self, exponent: Expr) -> Self {
        Expr::binary(BinaryOp::Pow, self, exponent)
    }

    /// `self * self`, kept as a product so the derivative stays exact at 0.
    pub fn square(self) -> Self {
        Expr::binary(BinaryOp::Mul, self.clone(), self)
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Expr::Const(_))
    }

    /// The single variable this expression *is*, if it is a bare reference.
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Expr::Var(v) => Some(*v),
            _ => None,
        }
    }

    /// Collect every variable the expression depends on.
    pub fn collect_vars(&self, out: &mut BTreeSet<Var>) {
        match self {
            Expr::Var(v) => {
                out.insert(*v);
            }
            Expr::Const(_) => {}
            Expr::Unary(_, a) => a.collect_vars(out),
            Expr::Binary(_, a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }

    pub fn vars(&self) -> BTreeSet<Var> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    pub fn depends_on_controls(&self) -> bool {
        self.vars().iter().any(|v| matches!(v, Var::Control(_)))
    }

    /// Check all references against declared dimensions.
    pub fn validate(&self, dims: Dims) -> ExprResult<()> {
        match self {
            Expr::Var(v) => {
                let ok = match *v {
                    Var::State(i) => i < dims.nx,
                    Var::Control(i) => i < dims.nu,
                    Var::Param(i) => i < dims.np,
                    Var::Time => true,
                };
                if ok {
                    Ok(())
                } else {
                    Err(ExprError::UnknownVariable { var: *v })
                }
            }
            Expr::Const(c) => {
                if c.is_finite() {
                    Ok(())
                } else {
                    Err(ExprError::NonFiniteConstant { value: *c })
                }
            }
            Expr::Unary(_, a) => a.validate(dims),
            Expr::Binary(_, a, b) => {
                a.validate(dims)?;
                b.validate(dims)
            }
        }
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl From<Var> for Expr {
    fn from(v: Var) -> Self {
        Expr::Var(v)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Unary(UnaryOp::Neg, a) => write!(f, "(-{a})"),
            Expr::Unary(op, a) => write!(f, "{}({a})", op.name()),
            Expr::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fold() {
        let e = Expr::binary(BinaryOp::Mul, Expr::Const(2.0), Expr::Const(3.0));
        assert_eq!(e, Expr::Const(6.0));
        let e = Expr::unary(UnaryOp::Neg, Expr::Const(2.0));
        assert_eq!(e, Expr::Const(-2.0));
    }

    #[test]
    fn identities_drop_nodes() {
        let x = Expr::state(0);
        assert_eq!(Expr::binary(BinaryOp::Add, x.clone(), Expr::Const(0.0)), x);
        assert_eq!(Expr::binary(BinaryOp::Mul, Expr::Const(1.0), x.clone()), x);
    }

    #[test]
    fn validate_rejects_unknown_state() {
        let dims = Dims { nx: 1, nu: 0, np: 0 };
        let e = Expr::state(0) + Expr::state(3);
        assert_eq!(
            e.validate(dims),
            Err(ExprError::UnknownVariable {
                var: Var::State(3)
            })
        );
    }

    #[test]
    fn vars_are_collected() {
        let e = Expr::state(1) * Expr::control(0) + Expr::time();
        let vars = e.vars();
        assert!(vars.contains(&Var::State(1)));
        assert!(vars.contains(&Var::Control(0)));
        assert!(vars.contains(&Var::Time));
        assert_eq!(vars.len(), 3);
        assert!(e.depends_on_controls());
    }

    #[test]
    fn display_is_readable() {
        let e = (Expr::state(0) - 0.2 * Expr::state(1)).sin();
        assert_eq!(e.to_string(), "sin((x0 - (0.2 * x1)))");
    }
}
