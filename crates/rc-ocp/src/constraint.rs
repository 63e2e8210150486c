//! Path and boundary constraints.

use std::fmt;

use rc_expr::Expr;

/// Where a constraint is enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Every mesh node of the horizon.
    Path,
    /// First node only.
    AtStart,
    /// Last node only.
    AtEnd,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::Path => write!(f, "path"),
            ConstraintKind::AtStart => write!(f, "start"),
            ConstraintKind::AtEnd => write!(f, "end"),
        }
    }
}

/// `lower <= expr <= upper`. Equal bounds give an equality, infinite bounds
/// a one-sided constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub expr: Expr,
    pub lower: f64,
    pub upper: f64,
}

impl Constraint {
    pub fn bounded(kind: ConstraintKind, expr: Expr, lower: f64, upper: f64) -> Self {
        Self {
            kind,
            expr,
            lower,
            upper,
        }
    }

    pub fn equal(kind: ConstraintKind, expr: Expr, value: f64) -> Self {
        Self::bounded(kind, expr, value, value)
    }

    pub fn at_least(kind: ConstraintKind, expr: Expr, lower: f64) -> Self {
        Self::bounded(kind, expr, lower, f64::INFINITY)
    }

    pub fn at_most(kind: ConstraintKind, expr: Expr, upper: f64) -> Self {
        Self::bounded(kind, expr, f64::NEG_INFINITY, upper)
    }

    pub fn is_equality(&self) -> bool {
        self.lower == self.upper
    }

    /// Bounds are feasible: `lower <= upper` and neither is NaN.
    pub fn bounds_feasible(&self) -> bool {
        self.lower <= self.upper
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_of_bounds() {
        let x = Expr::state(0);
        assert!(Constraint::equal(ConstraintKind::AtStart, x.clone(), 1.0).is_equality());
        let c = Constraint::at_least(ConstraintKind::Path, x.clone(), -0.1);
        assert!(!c.is_equality());
        assert_eq!(c.upper, f64::INFINITY);
        assert!(!Constraint::bounded(ConstraintKind::Path, x.clone(), 1.0, 0.0).bounds_feasible());
        assert!(!Constraint::bounded(ConstraintKind::Path, x, f64::NAN, 0.0).bounds_feasible());
    }
}
