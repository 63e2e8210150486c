//! Fixed-step explicit Runge-Kutta integrators with sensitivities.
//!
//! The sensitivity of the discrete map is propagated through every stage
//! (internal numerical differentiation), so the returned Jacobians are the
//! exact derivatives of the computed end state, not of the exact flow.

use nalgebra::{DMatrix, DVector};
use rc_expr::Point;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::model::DynamicsModel;
use crate::time::TimeMap;

/// Integrator family selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// Forward Euler (1st order, 1 rhs call per step).
    Euler,
    /// Heun's method (2nd order).
    Rk2,
    /// Kutta's third-order method.
    Rk3,
    /// Classical 4th-order Runge-Kutta (default).
    #[default]
    Rk4,
    /// Dormand-Prince 5th-order weights used at a fixed step.
    Rk45,
}

/// Butcher tableau of an explicit method. Row `i` of `a` has `i` entries.
#[derive(Debug)]
pub struct Tableau {
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub c: &'static [f64],
}

impl Tableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }
}

static EULER: Tableau = Tableau {
    a: &[&[]],
    b: &[1.0],
    c: &[0.0],
};

static HEUN: Tableau = Tableau {
    a: &[&[], &[1.0]],
    b: &[0.5, 0.5],
    c: &[0.0, 1.0],
};

static KUTTA3: Tableau = Tableau {
    a: &[&[], &[0.5], &[-1.0, 2.0]],
    b: &[1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
    c: &[0.0, 0.5, 1.0],
};

static RK4: Tableau = Tableau {
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    c: &[0.0, 0.5, 0.5, 1.0],
};

// The seventh (FSAL) stage only feeds the embedded error estimate.
static DOPRI5: Tableau = Tableau {
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
    ],
    b: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0],
};

impl IntegratorType {
    pub fn tableau(self) -> &'static Tableau {
        match self {
            IntegratorType::Euler => &EULER,
            IntegratorType::Rk2 => &HEUN,
            IntegratorType::Rk3 => &KUTTA3,
            IntegratorType::Rk4 => &RK4,
            IntegratorType::Rk45 => &DOPRI5,
        }
    }

    pub fn order(self) -> usize {
        match self {
            IntegratorType::Euler => 1,
            IntegratorType::Rk2 => 2,
            IntegratorType::Rk3 => 3,
            IntegratorType::Rk4 => 4,
            IntegratorType::Rk45 => 5,
        }
    }
}

/// End state of one interval and its first-order sensitivities.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalResult {
    pub x_end: DVector<f64>,
    /// ∂x_end/∂x0, `nx × nx`
    pub dx0: DMatrix<f64>,
    /// ∂x_end/∂u, `nx × nu`
    pub du: DMatrix<f64>,
    /// ∂x_end/∂p, `nx × np`
    pub dp: DMatrix<f64>,
}

/// Explicit Runge-Kutta integrator taking `steps` equal sub-steps per call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RungeKutta {
    method: IntegratorType,
    steps: usize,
}

impl RungeKutta {
    pub fn new(method: IntegratorType, steps: usize) -> ModelResult<Self> {
        if steps == 0 {
            return Err(ModelError::InvalidArg {
                what: "integrator steps must be positive",
            });
        }
        Ok(Self { method, steps })
    }

    pub fn method(&self) -> IntegratorType {
        self.method
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Integrate over the normalized span `[s0, s1]` with the control held.
    pub fn integrate<M: DynamicsModel + ?Sized>(
        &self,
        model: &M,
        x0: &DVector<f64>,
        u: &DVector<f64>,
        p: &DVector<f64>,
        span: (f64, f64),
        time: &TimeMap,
    ) -> ModelResult<IntervalResult> {
        check_inputs(model, x0, u, p)?;
        let dims = model.dims();
        let (nx, nu, np) = (dims.nx, dims.nu, dims.np);
        let tab = self.method.tableau();
        let h = (span.1 - span.0) / self.steps as f64;

        let mut y = x0.clone();
        let mut g = DMatrix::zeros(nx, nx + nu + np);
        g.view_mut((0, 0), (nx, nx)).fill_with_identity();

        let mut k: Vec<DVector<f64>> = Vec::with_capacity(tab.stages());
        let mut dk: Vec<DMatrix<f64>> = Vec::with_capacity(tab.stages());

        for step in 0..self.steps {
            let s = span.0 + h * step as f64;
            k.clear();
            dk.clear();
            for (i, row) in tab.a.iter().enumerate() {
                let mut yi = y.clone();
                let mut gi = g.clone();
                for (j, aij) in row.iter().enumerate() {
                    if *aij != 0.0 {
                        yi.axpy(h * aij, &k[j], 1.0);
                        gi += &dk[j] * (h * aij);
                    }
                }
                let stage = scaled_rhs_jacobian(model, &yi, u, p, s + tab.c[i] * h, time)?;
                k.push(stage.f);
                dk.push(stage.fy * gi + stage.direct);
            }
            for (i, bi) in tab.b.iter().enumerate() {
                if *bi != 0.0 {
                    y.axpy(h * bi, &k[i], 1.0);
                    g += &dk[i] * (h * bi);
                }
            }
            let t_end = time.time_at(s + h, p);
            if !all_finite(y.iter()) {
                return Err(ModelError::NumericalFailure {
                    what: "integrated state",
                    time: t_end,
                });
            }
            if !all_finite(g.iter()) {
                return Err(ModelError::NumericalFailure {
                    what: "state sensitivity",
                    time: t_end,
                });
            }
        }

        Ok(IntervalResult {
            x_end: y,
            dx0: g.columns(0, nx).into_owned(),
            du: g.columns(nx, nu).into_owned(),
            dp: g.columns(nx + nu, np).into_owned(),
        })
    }

    /// Integrate values only, without sensitivities.
    pub fn propagate<M: DynamicsModel + ?Sized>(
        &self,
        model: &M,
        x0: &DVector<f64>,
        u: &DVector<f64>,
        p: &DVector<f64>,
        span: (f64, f64),
        time: &TimeMap,
    ) -> ModelResult<DVector<f64>> {
        check_inputs(model, x0, u, p)?;
        let tab = self.method.tableau();
        let h = (span.1 - span.0) / self.steps as f64;
        let len = time.length(p);

        let mut y = x0.clone();
        let mut k: Vec<DVector<f64>> = Vec::with_capacity(tab.stages());
        for step in 0..self.steps {
            let s = span.0 + h * step as f64;
            k.clear();
            for (i, row) in tab.a.iter().enumerate() {
                let mut yi = y.clone();
                for (j, aij) in row.iter().enumerate() {
                    if *aij != 0.0 {
                        yi.axpy(h * aij, &k[j], 1.0);
                    }
                }
                let si = s + tab.c[i] * h;
                let t = time.time_at(si, p);
                let pt = Point::new(yi.as_slice(), u.as_slice(), p.as_slice(), t);
                let f = model.rhs(&pt)? * len;
                if !all_finite(f.iter()) {
                    return Err(ModelError::NumericalFailure {
                        what: "right-hand side",
                        time: t,
                    });
                }
                k.push(f);
            }
            for (i, bi) in tab.b.iter().enumerate() {
                if *bi != 0.0 {
                    y.axpy(h * bi, &k[i], 1.0);
                }
            }
            if !all_finite(y.iter()) {
                return Err(ModelError::NumericalFailure {
                    what: "integrated state",
                    time: time.time_at(s + h, p),
                });
            }
        }
        Ok(y)
    }
}

/// Integrate one interval with sensitivities.
pub fn integrate_interval<M: DynamicsModel + ?Sized>(
    model: &M,
    integrator: &RungeKutta,
    x0: &DVector<f64>,
    u: &DVector<f64>,
    p: &DVector<f64>,
    span: (f64, f64),
    time: &TimeMap,
) -> ModelResult<IntervalResult> {
    integrator.integrate(model, x0, u, p, span, time)
}

/// Normalized right-hand side `F = L·f` and its derivatives at one stage.
struct Stage {
    f: DVector<f64>,
    /// ∂F/∂y
    fy: DMatrix<f64>,
    /// `[0, ∂F/∂u, ∂F/∂p]`, the part not flowing through the state.
    direct: DMatrix<f64>,
}

fn scaled_rhs_jacobian<M: DynamicsModel + ?Sized>(
    model: &M,
    y: &DVector<f64>,
    u: &DVector<f64>,
    p: &DVector<f64>,
    s: f64,
    time: &TimeMap,
) -> ModelResult<Stage> {
    let dims = model.dims();
    let (nx, nu, np) = (dims.nx, dims.nu, dims.np);
    let len = time.length(p);
    let t = time.time_at(s, p);
    let jac = model.rhs_jacobian(&Point::new(y.as_slice(), u.as_slice(), p.as_slice(), t))?;
    if !all_finite(jac.value.iter()) {
        return Err(ModelError::NumericalFailure {
            what: "right-hand side",
            time: t,
        });
    }
    let finite_derivatives = all_finite(jac.dx.iter())
        && all_finite(jac.du.iter())
        && all_finite(jac.dp.iter())
        && all_finite(jac.dt.iter());
    if !finite_derivatives {
        return Err(ModelError::NumericalFailure {
            what: "right-hand side derivative",
            time: t,
        });
    }

    let mut direct = DMatrix::zeros(nx, nx + nu + np);
    direct
        .view_mut((0, nx), (nx, nu))
        .copy_from(&(&jac.du * len));

    // d/dp [L f(y, u, p, t0 + L s)] = L f_p + (f + L s f_t) ∂L/∂p
    let mut fp = &jac.dp * len;
    if let Some(idx) = time.length_param().filter(|i| *i < np) {
        let chain = &jac.value + &jac.dt * (len * s);
        let mut column = fp.column_mut(idx);
        column += &chain;
    }
    direct.view_mut((0, nx + nu), (nx, np)).copy_from(&fp);

    Ok(Stage {
        f: jac.value * len,
        fy: jac.dx * len,
        direct,
    })
}

fn check_inputs<M: DynamicsModel + ?Sized>(
    model: &M,
    x0: &DVector<f64>,
    u: &DVector<f64>,
    p: &DVector<f64>,
) -> ModelResult<()> {
    let dims = model.dims();
    for (what, expected, got) in [
        ("initial state", dims.nx, x0.len()),
        ("control", dims.nu, u.len()),
        ("parameters", dims.np, p.len()),
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

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}
