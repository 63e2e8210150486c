//! Evaluation and forward-mode differentiation.

use nalgebra::DVector;

use crate::expr::{BinaryOp, Expr, UnaryOp, Var};

/// Declared variable counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Dims {
    pub nx: usize,
    pub nu: usize,
    pub np: usize,
}

impl Dims {
    pub fn new(nx: usize, nu: usize, np: usize) -> Self {
        Self { nx, nu, np }
    }

    /// Length of a gradient: states, controls, parameters and time.
    pub fn gradient_len(&self) -> usize {
        self.nx + self.nu + self.np + 1
    }

    /// Position of `var` inside a gradient vector.
    pub fn slot(&self, var: Var) -> usize {
        match var {
            Var::State(i) => i,
            Var::Control(i) => self.nx + i,
            Var::Param(i) => self.nx + self.nu + i,
            Var::Time => self.nx + self.nu + self.np,
        }
    }
}

/// Evaluation point `(x, u, p, t)`.
#[derive(Clone, Copy, Debug)]
pub struct Point<'a> {
    pub x: &'a [f64],
    pub u: &'a [f64],
    pub p: &'a [f64],
    pub t: f64,
}

impl<'a> Point<'a> {
    pub fn new(x: &'a [f64], u: &'a [f64], p: &'a [f64], t: f64) -> Self {
        Self { x, u, p, t }
    }

    pub fn dims(&self) -> Dims {
        Dims::new(self.x.len(), self.u.len(), self.p.len())
    }

    /// Value of a variable. Out-of-range references read as NaN so that
    /// unvalidated trees surface as non-finite results instead of panics.
    pub fn value(&self, var: Var) -> f64 {
        match var {
            Var::State(i) => self.x.get(i).copied().unwrap_or(f64::NAN),
            Var::Control(i) => self.u.get(i).copied().unwrap_or(f64::NAN),
            Var::Param(i) => self.p.get(i).copied().unwrap_or(f64::NAN),
            Var::Time => self.t,
        }
    }
}

/// Value plus gradient with respect to `[x, u, p, t]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub value: f64,
    pub grad: DVector<f64>,
}

impl Gradient {
    pub fn dx(&self, dims: Dims) -> nalgebra::DVectorView<'_, f64> {
        self.grad.rows(0, dims.nx)
    }

    pub fn du(&self, dims: Dims) -> nalgebra::DVectorView<'_, f64> {
        self.grad.rows(dims.nx, dims.nu)
    }

    pub fn dp(&self, dims: Dims) -> nalgebra::DVectorView<'_, f64> {
        self.grad.rows(dims.nx + dims.nu, dims.np)
    }

    pub fn dt(&self, dims: Dims) -> f64 {
        self.grad[dims.nx + dims.nu + dims.np]
    }
}

impl Expr {
    /// Evaluate at a point.
    pub fn eval(&self, pt: &Point<'_>) -> f64 {
        match self {
            Expr::Var(v) => pt.value(*v),
            Expr::Const(c) => *c,
            Expr::Unary(op, a) => op.apply(a.eval(pt)),
            Expr::Binary(op, a, b) => op.apply(a.eval(pt), b.eval(pt)),
        }
    }

    /// Evaluate value and gradient in one sweep.
    pub fn eval_gradient(&self, pt: &Point<'_>) -> Gradient {
        let dims = pt.dims();
        let (value, grad) = self.forward(pt, dims);
        Gradient { value, grad }
    }

    fn forward(&self, pt: &Point<'_>, dims: Dims) -> (f64, DVector<f64>) {
        match self {
            Expr::Var(v) => {
                let mut g = DVector::zeros(dims.gradient_len());
                g[dims.slot(*v)] = 1.0;
                (pt.value(*v), g)
            }
            Expr::Const(c) => (*c, DVector::zeros(dims.gradient_len())),
            Expr::Unary(op, a) => {
                let (va, ga) = a.forward(pt, dims);
                let d = op.derivative(va);
                let g = if matches!(op, UnaryOp::Neg) { -ga } else { ga * d };
                (op.apply(va), g)
            }
            Expr::Binary(op, a, b) => {
                let (va, ga) = a.forward(pt, dims);
                let (vb, gb) = b.forward(pt, dims);
                match op {
                    BinaryOp::Add => (va + vb, ga + gb),
                    BinaryOp::Sub => (va - vb, ga - gb),
                    BinaryOp::Mul => (va * vb, ga * vb + gb * va),
                    BinaryOp::Div => {
                        let inv = 1.0 / vb;
                        (va / vb, (ga - gb * (va * inv)) * inv)
                    }
                    BinaryOp::Pow => {
                        let value = va.powf(vb);
                        let mut g = ga * (vb * va.powf(vb - 1.0));
                        // ln(a) only enters when the exponent actually varies
                        if gb.iter().any(|d| *d != 0.0) {
                            g += gb * (value * va.ln());
                        }
                        (value, g)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rocket_velocity_rhs() -> Expr {
        // (u - 0.2 v^2) / m with v = x1, m = x2
        (Expr::control(0) - 0.2 * Expr::state(1).square()) / Expr::state(2)
    }

    #[test]
    fn eval_matches_hand_computation() {
        let e = rocket_velocity_rhs();
        let pt = Point::new(&[0.0, 1.5, 0.8], &[1.1], &[], 0.0);
        let expected = (1.1 - 0.2 * 1.5 * 1.5) / 0.8;
        assert!((e.eval(&pt) - expected).abs() < 1e-14);
    }

    #[test]
    fn gradient_matches_analytic() {
        let e = rocket_velocity_rhs();
        let (v, m, u) = (1.5, 0.8, 1.1);
        let x = [0.0, v, m];
        let ctrl = [u];
        let pt = Point::new(&x, &ctrl, &[], 0.0);
        let g = e.eval_gradient(&pt);
        let dims = pt.dims();
        assert!((g.dx(dims)[0]).abs() < 1e-14);
        assert!((g.dx(dims)[1] - (-0.4 * v / m)).abs() < 1e-12);
        assert!((g.dx(dims)[2] - (-(u - 0.2 * v * v) / (m * m))).abs() < 1e-12);
        assert!((g.du(dims)[0] - 1.0 / m).abs() < 1e-12);
        assert_eq!(g.dt(dims), 0.0);
    }

    #[test]
    fn pow_with_constant_exponent_is_safe_at_zero() {
        let e = Expr::state(0).powf(2.0);
        let pt = Point::new(&[0.0], &[], &[], 0.0);
        let g = e.eval_gradient(&pt);
        assert_eq!(g.value, 0.0);
        assert_eq!(g.grad[0], 0.0);
        assert!(g.grad.iter().all(|d| d.is_finite()));
    }

    #[test]
    fn time_slot_is_last() {
        let e = 3.0 * Expr::time() + Expr::param(0);
        let pt = Point::new(&[1.0], &[2.0], &[4.0], 0.5);
        let g = e.eval_gradient(&pt);
        let dims = pt.dims();
        assert!((g.value - 5.5).abs() < 1e-14);
        assert_eq!(g.dt(dims), 3.0);
        assert_eq!(g.dp(dims)[0], 1.0);
    }

    #[test]
    fn out_of_range_reads_nan() {
        let e = Expr::state(4);
        let pt = Point::new(&[1.0], &[], &[], 0.0);
        assert!(e.eval(&pt).is_nan());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Expr {
        let x = Expr::state(0);
        let y = Expr::state(1);
        let u = Expr::control(0);
        (x.clone() * y.clone()).sin() + (u.clone() / (1.0 + y.square())).exp() - x.cos() * u.tanh()
    }

    proptest! {
        #[test]
        fn gradient_agrees_with_central_differences(
            x in -2.0_f64..2.0, y in -2.0_f64..2.0, u in -2.0_f64..2.0
        ) {
            let e = sample();
            let h = 1e-6;
            let base = [x, y];
            let ctrl = [u];
            let pt = Point::new(&base, &ctrl, &[], 0.0);
            let g = e.eval_gradient(&pt);
            prop_assert!((g.value - e.eval(&pt)).abs() < 1e-12);

            for i in 0..2 {
                let mut xp = base;
                let mut xm = base;
                xp[i] += h;
                xm[i] -= h;
                let fd = (e.eval(&Point::new(&xp, &ctrl, &[], 0.0))
                    - e.eval(&Point::new(&xm, &ctrl, &[], 0.0))) / (2.0 * h);
                prop_assert!((fd - g.grad[i]).abs() < 1e-5);
            }
            let fd_u = (e.eval(&Point::new(&base, &[u + h], &[], 0.0))
                - e.eval(&Point::new(&base, &[u - h], &[], 0.0))) / (2.0 * h);
            prop_assert!((fd_u - g.grad[2]).abs() < 1e-5);
        }
    }
}
