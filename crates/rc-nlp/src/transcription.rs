//! Shooting transcription and NLP evaluation.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use rc_expr::{Expr, Gradient, Point, Var};
use rc_model::{IntegratorType, IntervalResult, ModelResult, RungeKutta, TimeMap};
use rc_ocp::{ConstraintKind, Objective, Ocp};

use crate::error::{NlpError, NlpResult};
use crate::eval::{LsqResidual, NlpEval, NodeTrajectory};
use crate::layout::{Layout, Transcription};

/// How the problem is discretized and integrated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranscriptionOptions {
    pub mode: Transcription,
    pub integrator: IntegratorType,
    /// Integrator sub-steps per mesh interval.
    pub steps: usize,
    /// Integrate shooting intervals on the rayon pool.
    pub parallel: bool,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            mode: Transcription::MultipleShooting,
            integrator: IntegratorType::Rk4,
            steps: 4,
            parallel: false,
        }
    }
}

/// One transcribed constraint row: constraint `constraint` at node `node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ConstraintRow {
    pub(crate) constraint: usize,
    pub(crate) node: usize,
    pub(crate) equality: bool,
}

/// Node states of one evaluation.
struct NodeData {
    states: Vec<DVector<f64>>,
    /// ∂X_k/∂z per node (single shooting with derivatives only).
    sens: Vec<DMatrix<f64>>,
    /// Interval integrations (multiple shooting only).
    intervals: Vec<IntervalResult>,
}

/// Transcribed nonlinear program.
#[derive(Clone, Debug)]
pub struct Nlp {
    ocp: Ocp,
    layout: Layout,
    integrator: RungeKutta,
    parallel: bool,
    time: TimeMap,
    initial_state: Option<DVector<f64>>,
    rows: Vec<ConstraintRow>,
    n_eq: usize,
    n_ineq: usize,
}

impl Nlp {
    pub fn new(ocp: Ocp, opts: TranscriptionOptions) -> NlpResult<Self> {
        let dims = ocp.dims();
        let layout = Layout {
            nx: dims.nx,
            nu: dims.nu,
            np: dims.np,
            intervals: ocp.mesh().intervals(),
            mode: opts.mode,
        };
        let integrator = RungeKutta::new(opts.integrator, opts.steps)?;
        let time = *ocp.time();
        let mut nlp = Self {
            ocp,
            layout,
            integrator,
            parallel: opts.parallel,
            time,
            initial_state: None,
            rows: Vec::new(),
            n_eq: 0,
            n_ineq: 0,
        };
        nlp.rebuild_rows();
        tracing::debug!(
            mode = ?opts.mode,
            variables = layout.len(),
            equalities = nlp.n_eq,
            inequalities = nlp.n_ineq,
            "transcribed problem"
        );
        Ok(nlp)
    }

    pub fn ocp(&self) -> &Ocp {
        &self.ocp
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn num_variables(&self) -> usize {
        self.layout.len()
    }

    pub fn num_eq(&self) -> usize {
        self.n_eq
    }

    pub fn num_ineq(&self) -> usize {
        self.n_ineq
    }

    pub fn integrator(&self) -> &RungeKutta {
        &self.integrator
    }

    pub fn time(&self) -> &TimeMap {
        &self.time
    }

    /// Move the horizon so that it starts at `t0`.
    pub fn set_start_time(&mut self, t0: f64) {
        self.time = self.time.starting_at(t0);
    }

    pub fn initial_state(&self) -> Option<&DVector<f64>> {
        self.initial_state.as_ref()
    }

    /// Replace every start constraint by `x_0 = x̂`, or restore them with `None`.
    pub fn set_initial_state(&mut self, state: Option<DVector<f64>>) -> NlpResult<()> {
        if let Some(x) = &state {
            if x.len() != self.layout.nx {
                return Err(NlpError::DimensionMismatch {
                    what: "initial state",
                    expected: self.layout.nx,
                    got: x.len(),
                });
            }
            if x.iter().any(|v| !v.is_finite()) {
                return Err(NlpError::InvalidArg {
                    what: "initial state must be finite",
                });
            }
        }
        self.initial_state = state;
        self.rebuild_rows();
        Ok(())
    }

    fn rebuild_rows(&mut self) {
        let n = self.layout.intervals;
        let embed = self.initial_state.is_some();
        let mut rows = Vec::new();
        for (ci, c) in self.ocp.constraints().iter().enumerate() {
            let nodes: Vec<usize> = match c.kind {
                ConstraintKind::AtStart if embed => continue,
                ConstraintKind::AtStart => vec![0],
                ConstraintKind::AtEnd => vec![n],
                ConstraintKind::Path => path_nodes(&c.expr, n),
            };
            let equality = c.is_equality();
            rows.extend(nodes.into_iter().map(|node| ConstraintRow {
                constraint: ci,
                node,
                equality,
            }));
        }
        let eq_rows = rows.iter().filter(|r| r.equality).count();
        self.n_eq =
            self.layout.continuity_rows() + if embed { self.layout.nx } else { 0 } + eq_rows;
        self.n_ineq = rows.len() - eq_rows;
        self.rows = rows;
    }

    pub(crate) fn check_len(&self, z: &DVector<f64>) -> NlpResult<()> {
        if z.len() != self.layout.len() {
            return Err(NlpError::DimensionMismatch {
                what: "decision vector",
                expected: self.layout.len(),
                got: z.len(),
            });
        }
        Ok(())
    }

    pub fn params(&self, z: &DVector<f64>) -> DVector<f64> {
        z.rows(self.layout.param_offset(), self.layout.np).into_owned()
    }

    /// Control held on interval `k`.
    pub fn control_at(&self, z: &DVector<f64>, k: usize) -> DVector<f64> {
        z.rows(self.layout.control_offset(k), self.layout.nu)
            .into_owned()
    }

    /// Free state at node `k` (every node in multiple shooting, node 0 in
    /// single shooting).
    pub fn free_state(&self, z: &DVector<f64>, k: usize) -> Option<DVector<f64>> {
        self.layout
            .state_offset(k)
            .map(|off| z.rows(off, self.layout.nx).into_owned())
    }

    fn node_time(&self, k: usize, p: &DVector<f64>) -> f64 {
        self.time.time_at(self.ocp.mesh().points()[k], p)
    }

    fn integrate_interval(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
        p: &DVector<f64>,
        k: usize,
        derivs: bool,
    ) -> ModelResult<IntervalResult> {
        let model = self.ocp.model();
        let span = self.ocp.mesh().span(k);
        if derivs {
            self.integrator.integrate(model, x, u, p, span, &self.time)
        } else {
            let x_end = self.integrator.propagate(model, x, u, p, span, &self.time)?;
            Ok(IntervalResult {
                x_end,
                dx0: DMatrix::zeros(0, 0),
                du: DMatrix::zeros(0, 0),
                dp: DMatrix::zeros(0, 0),
            })
        }
    }

    fn nodes(&self, z: &DVector<f64>, derivs: bool) -> NlpResult<NodeData> {
        let l = self.layout;
        let n = l.intervals;
        let p = self.params(z);
        match l.mode {
            Transcription::MultipleShooting => {
                let states: Vec<DVector<f64>> = (0..=n)
                    .filter_map(|k| self.free_state(z, k))
                    .collect();
                let job = |k: usize| {
                    self.integrate_interval(&states[k], &self.control_at(z, k), &p, k, derivs)
                };
                let intervals = if self.parallel {
                    (0..n)
                        .into_par_iter()
                        .map(&job)
                        .collect::<ModelResult<Vec<_>>>()?
                } else {
                    (0..n).map(&job).collect::<ModelResult<Vec<_>>>()?
                };
                Ok(NodeData {
                    states,
                    sens: Vec::new(),
                    intervals,
                })
            }
            Transcription::SingleShooting => {
                let mut states = Vec::with_capacity(n + 1);
                let mut sens = Vec::new();
                let x0 = z.rows(0, l.nx).into_owned();
                if derivs {
                    let mut d0 = DMatrix::zeros(l.nx, l.len());
                    d0.view_mut((0, 0), (l.nx, l.nx)).fill_with_identity();
                    sens.push(d0);
                }
                states.push(x0);
                for k in 0..n {
                    let res = self.integrate_interval(&states[k], &self.control_at(z, k), &p, k, derivs)?;
                    if derivs {
                        let mut d = &res.dx0 * &sens[k];
                        let mut u_cols = d.view_mut((0, l.control_offset(k)), (l.nx, l.nu));
                        u_cols += &res.du;
                        let mut p_cols = d.view_mut((0, l.param_offset()), (l.nx, l.np));
                        p_cols += &res.dp;
                        sens.push(d);
                    }
                    states.push(res.x_end);
                }
                Ok(NodeData {
                    states,
                    sens,
                    intervals: Vec::new(),
                })
            }
        }
    }

    /// Gradient with respect to `z` of a scalar function evaluated at node `k`.
    fn node_row(&self, data: &NodeData, k: usize, g: &Gradient) -> DVector<f64> {
        let l = self.layout;
        let dims = self.ocp.dims();
        let mut row = DVector::zeros(l.len());
        let gx = g.dx(dims);
        if let Some(dk) = data.sens.get(k) {
            row += dk.tr_mul(&gx);
        } else if let Some(off) = l.state_offset(k) {
            for i in 0..l.nx {
                row[off + i] += gx[i];
            }
        }
        let uo = l.control_offset(l.node_control(k));
        let gu = g.du(dims);
        for i in 0..l.nu {
            row[uo + i] += gu[i];
        }
        let po = l.param_offset();
        let gp = g.dp(dims);
        for i in 0..l.np {
            row[po + i] += gp[i];
        }
        // t_k = t0 + L(p) s_k
        if let Some(idx) = self.time.length_param() {
            row[po + idx] += g.dt(dims) * self.ocp.mesh().points()[k];
        }
        row
    }

    /// Evaluate objective and constraints with first derivatives.
    pub fn evaluate(&self, z: &DVector<f64>) -> NlpResult<NlpEval> {
        self.assemble(z, true)
    }

    /// Evaluate objective and constraint values only. Gradient and Jacobians
    /// of the result have zero columns.
    pub fn evaluate_values(&self, z: &DVector<f64>) -> NlpResult<NlpEval> {
        self.assemble(z, false)
    }

    fn assemble(&self, z: &DVector<f64>, derivs: bool) -> NlpResult<NlpEval> {
        self.check_len(z)?;
        let l = self.layout;
        let n = l.intervals;
        let nx = l.nx;
        let cols = if derivs { l.len() } else { 0 };
        let data = self.nodes(z, derivs)?;
        let p = self.params(z);

        let mut eq = DVector::zeros(self.n_eq);
        let mut eq_jacobian = DMatrix::zeros(self.n_eq, cols);
        let mut ineq = DVector::zeros(self.n_ineq);
        let mut ineq_lower = DVector::zeros(self.n_ineq);
        let mut ineq_upper = DVector::zeros(self.n_ineq);
        let mut ineq_jacobian = DMatrix::zeros(self.n_ineq, cols);
        let mut r_eq = 0;

        // Φ_k(x_k, u_k, p) - x_{k+1} = 0
        for (k, res) in data.intervals.iter().enumerate() {
            let gap = &res.x_end - &data.states[k + 1];
            eq.rows_mut(r_eq, nx).copy_from(&gap);
            if derivs {
                if let (Some(xo), Some(next)) = (l.state_offset(k), l.state_offset(k + 1)) {
                    eq_jacobian
                        .view_mut((r_eq, xo), (nx, nx))
                        .copy_from(&res.dx0);
                    eq_jacobian
                        .view_mut((r_eq, l.control_offset(k)), (nx, l.nu))
                        .copy_from(&res.du);
                    eq_jacobian
                        .view_mut((r_eq, l.param_offset()), (nx, l.np))
                        .copy_from(&res.dp);
                    for i in 0..nx {
                        eq_jacobian[(r_eq + i, next + i)] = -1.0;
                    }
                }
            }
            r_eq += nx;
        }

        if let Some(x_hat) = &self.initial_state {
            for i in 0..nx {
                eq[r_eq + i] = z[i] - x_hat[i];
                if derivs {
                    eq_jacobian[(r_eq + i, i)] = 1.0;
                }
            }
            r_eq += nx;
        }

        let mut r_in = 0;
        for cr in &self.rows {
            let c = &self.ocp.constraints()[cr.constraint];
            let k = cr.node;
            let u = self.control_at(z, l.node_control(k));
            let pt = Point::new(
                data.states[k].as_slice(),
                u.as_slice(),
                p.as_slice(),
                self.node_time(k, &p),
            );
            let (value, row) = if derivs {
                let g = c.expr.eval_gradient(&pt);
                let row = self.node_row(&data, k, &g);
                (g.value, Some(row))
            } else {
                (c.expr.eval(&pt), None)
            };
            if cr.equality {
                eq[r_eq] = value - c.lower;
                if let Some(row) = row {
                    eq_jacobian.set_row(r_eq, &row.transpose());
                }
                r_eq += 1;
            } else {
                ineq[r_in] = value;
                ineq_lower[r_in] = c.lower;
                ineq_upper[r_in] = c.upper;
                if let Some(row) = row {
                    ineq_jacobian.set_row(r_in, &row.transpose());
                }
                r_in += 1;
            }
        }

        let (objective, gradient, residual) = match self.ocp.objective() {
            Objective::Mayer(phi) => {
                let u = self.control_at(z, l.node_control(n));
                let pt = Point::new(
                    data.states[n].as_slice(),
                    u.as_slice(),
                    p.as_slice(),
                    self.node_time(n, &p),
                );
                if derivs {
                    let g = phi.eval_gradient(&pt);
                    (g.value, self.node_row(&data, n, &g), None)
                } else {
                    (phi.eval(&pt), DVector::zeros(0), None)
                }
            }
            Objective::LeastSquares(lsq) => {
                let mut terms = Vec::new();
                if let Some(stage) = &lsq.stage {
                    for k in lsq.nodes.resolve(n) {
                        terms.push((k, stage));
                    }
                }
                if let Some(end) = &lsq.end {
                    terms.push((n, end));
                }
                let rows: usize = terms.iter().map(|(_, t)| t.dim()).sum();
                let mut residual = LsqResidual {
                    value: DVector::zeros(rows),
                    jacobian: DMatrix::zeros(rows, cols),
                    blocks: Vec::with_capacity(terms.len()),
                };
                let mut r = 0;
                for (k, term) in terms {
                    let u = self.control_at(z, l.node_control(k));
                    let pt = Point::new(
                        data.states[k].as_slice(),
                        u.as_slice(),
                        p.as_slice(),
                        self.node_time(k, &p),
                    );
                    residual.blocks.push((r, term.weight.clone()));
                    for (i, h) in term.residuals.iter().enumerate() {
                        if derivs {
                            let g = h.eval_gradient(&pt);
                            residual.value[r + i] = g.value - term.reference[i];
                            let row = self.node_row(&data, k, &g);
                            residual.jacobian.set_row(r + i, &row.transpose());
                        } else {
                            residual.value[r + i] = h.eval(&pt) - term.reference[i];
                        }
                    }
                    r += term.dim();
                }
                let gradient = if derivs {
                    residual.gradient()
                } else {
                    DVector::zeros(0)
                };
                (residual.objective(), gradient, Some(residual))
            }
        };

        let eval = NlpEval {
            objective,
            gradient,
            eq,
            eq_jacobian,
            ineq,
            ineq_lower,
            ineq_upper,
            ineq_jacobian,
            residual,
        };
        if !eval.is_finite() {
            return Err(NlpError::Model(rc_model::ModelError::NumericalFailure {
                what: "objective or constraints",
                time: self.time.t0,
            }));
        }
        Ok(eval)
    }

    /// States, controls and intermediates at every node of `z`.
    pub fn trajectory(&self, z: &DVector<f64>) -> NlpResult<NodeTrajectory> {
        self.check_len(z)?;
        let n = self.layout.intervals;
        let p = self.params(z);
        let states = match self.layout.mode {
            Transcription::MultipleShooting => {
                (0..=n).filter_map(|k| self.free_state(z, k)).collect()
            }
            Transcription::SingleShooting => self.nodes(z, false)?.states,
        };
        let controls: Vec<DVector<f64>> = (0..=n)
            .map(|k| self.control_at(z, self.layout.node_control(k)))
            .collect();
        let times: Vec<f64> = (0..=n).map(|k| self.node_time(k, &p)).collect();
        let intermediates = (0..=n)
            .map(|k| {
                let pt = Point::new(
                    states[k].as_slice(),
                    controls[k].as_slice(),
                    p.as_slice(),
                    times[k],
                );
                DVector::from_iterator(
                    self.ocp.symbols().intermediates().len(),
                    self.ocp
                        .symbols()
                        .intermediates()
                        .iter()
                        .map(|i| i.expr.eval(&pt)),
                )
            })
            .collect();
        Ok(NodeTrajectory {
            times,
            states,
            controls,
            params: p,
            intermediates,
        })
    }
}

/// Nodes at which a path constraint is enforced. Constraints without state
/// or time dependence would repeat identical rows, so they are emitted once
/// per control interval, or once overall when they only involve parameters.
fn path_nodes(expr: &Expr, intervals: usize) -> Vec<usize> {
    let vars = expr.vars();
    let on_states = vars
        .iter()
        .any(|v| matches!(v, Var::State(_) | Var::Time));
    let on_controls = vars.iter().any(|v| matches!(v, Var::Control(_)));
    if on_states {
        (0..=intervals).collect()
    } else if on_controls {
        (0..intervals).collect()
    } else {
        vec![0]
    }
}
