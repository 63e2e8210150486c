//! Transcription structure and derivative checks.

use nalgebra::{DMatrix, DVector};
use rc_expr::Expr;
use rc_model::IntegratorType;
use rc_nlp::{Nlp, NlpEval, Transcription, TranscriptionOptions};
use rc_ocp::{
    Constraint, ConstraintKind, LeastSquares, LsqTerm, Mesh, NodeSelection, Ocp, OcpBuilder,
    Weight,
};

fn rocket(mayer: bool) -> Ocp {
    let mut ocp = OcpBuilder::new();
    let s = ocp.state("s").unwrap();
    let v = ocp.state("v").unwrap();
    let m = ocp.state("m").unwrap();
    let u = ocp.control("u").unwrap();
    let t = ocp.parameter("T").unwrap();
    ocp.intermediate("drag", 0.2 * v.clone().square()).unwrap();

    ocp.dot(&s, v.clone()).unwrap();
    ocp.dot(&v, (u.clone() - 0.2 * v.clone().square()) / m.clone())
        .unwrap();
    ocp.dot(&m, -0.01 * u.clone().square()).unwrap();
    ocp.free_horizon(0.0, &t).unwrap();
    ocp.mesh(Mesh::from_fractions(&[1.0, 2.0, 1.0, 1.0]).unwrap());

    ocp.subject_to(Constraint::equal(ConstraintKind::AtStart, s.clone(), 0.0))
        .subject_to(Constraint::equal(ConstraintKind::AtStart, v.clone(), 0.0))
        .subject_to(Constraint::equal(ConstraintKind::AtStart, m.clone(), 1.0))
        .subject_to(Constraint::equal(ConstraintKind::AtEnd, s.clone(), 10.0))
        .subject_to(Constraint::equal(ConstraintKind::AtEnd, v.clone(), 0.0))
        .subject_to(Constraint::bounded(ConstraintKind::Path, v.clone(), -0.1, 1.7))
        .subject_to(Constraint::bounded(ConstraintKind::Path, u.clone(), -1.1, 1.1))
        .subject_to(Constraint::bounded(ConstraintKind::Path, t.clone(), 5.0, 15.0));

    if mayer {
        ocp.minimize_mayer(t).unwrap();
    } else {
        let lsq = LeastSquares::new()
            .stage(LsqTerm::new(
                vec![v.clone() - 1.0, u.clone() * Expr::time()],
                Weight::Full(DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0])),
            ))
            .on_nodes(NodeSelection::AllNodes)
            .end(
                LsqTerm::new(vec![s], Weight::identity(1))
                    .with_reference(DVector::from_vec(vec![10.0])),
            );
        ocp.minimize_least_squares(lsq).unwrap();
    }
    ocp.build().unwrap()
}

fn options(mode: Transcription) -> TranscriptionOptions {
    TranscriptionOptions {
        mode,
        integrator: IntegratorType::Rk4,
        steps: 3,
        parallel: false,
    }
}

fn perturbed_point(nlp: &Nlp) -> DVector<f64> {
    let mut z = nlp.initial_guess();
    for i in 0..z.len() {
        z[i] += 0.05 * ((i as f64) * 0.7).sin();
    }
    z
}

fn fd_check(nlp: &Nlp, z: &DVector<f64>) {
    let exact = nlp.evaluate(z).unwrap();
    let h = 1e-6;
    for j in 0..z.len() {
        let mut zp = z.clone();
        let mut zm = z.clone();
        zp[j] += h;
        zm[j] -= h;
        let ep: NlpEval = nlp.evaluate_values(&zp).unwrap();
        let em: NlpEval = nlp.evaluate_values(&zm).unwrap();
        let d_obj = (ep.objective - em.objective) / (2.0 * h);
        assert!(
            (d_obj - exact.gradient[j]).abs() < 1e-5 * (1.0 + d_obj.abs()),
            "objective column {j}: {d_obj} vs {}",
            exact.gradient[j]
        );
        let d_eq = (&ep.eq - &em.eq) / (2.0 * h);
        let col = exact.eq_jacobian.column(j);
        assert!((d_eq - col).amax() < 1e-5, "equality column {j}");
        let d_in = (&ep.ineq - &em.ineq) / (2.0 * h);
        let col = exact.ineq_jacobian.column(j);
        assert!((d_in - col).amax() < 1e-5, "inequality column {j}");
    }
}

#[test]
fn derivatives_match_finite_differences() {
    for mayer in [true, false] {
        for mode in [Transcription::MultipleShooting, Transcription::SingleShooting] {
            let nlp = Nlp::new(rocket(mayer), options(mode)).unwrap();
            let z = perturbed_point(&nlp);
            fd_check(&nlp, &z);
        }
    }
}

#[test]
fn row_counts() {
    let ms = Nlp::new(rocket(true), options(Transcription::MultipleShooting)).unwrap();
    // 4 intervals, 3 states: 12 continuity + 3 start + 2 end
    assert_eq!(ms.num_eq(), 17);
    // v on 5 nodes, u on 4 intervals, T once
    assert_eq!(ms.num_ineq(), 10);
    assert_eq!(ms.num_variables(), 4 * 4 + 3 + 1);

    let ss = Nlp::new(rocket(true), options(Transcription::SingleShooting)).unwrap();
    assert_eq!(ss.num_eq(), 5);
    assert_eq!(ss.num_ineq(), 10);
    assert_eq!(ss.num_variables(), 3 + 4 + 1);
}

#[test]
fn embedded_state_replaces_start_constraints() {
    let mut nlp = Nlp::new(rocket(true), options(Transcription::MultipleShooting)).unwrap();
    nlp.set_initial_state(Some(DVector::from_vec(vec![0.5, 0.1, 0.9])))
        .unwrap();
    assert_eq!(nlp.num_eq(), 12 + 3 + 2);
    let z = nlp.initial_guess();
    assert_eq!(z[0], 0.5);
    let eval = nlp.evaluate(&z).unwrap();
    assert_eq!(eval.eq.rows(12, 3).amax(), 0.0);

    assert!(nlp.set_initial_state(Some(DVector::zeros(2))).is_err());
    nlp.set_initial_state(None).unwrap();
    assert_eq!(nlp.num_eq(), 17);
}

#[test]
fn default_guess_interpolates_boundary_values() {
    let nlp = Nlp::new(rocket(true), options(Transcription::MultipleShooting)).unwrap();
    let z = nlp.initial_guess();
    let l = *nlp.layout();
    let last = l.state_offset(4).unwrap();
    assert_eq!(z[last], 10.0);
    assert_eq!(z[last + 2], 1.0);
    let mid = l.state_offset(1).unwrap();
    assert!((z[mid] - 2.0).abs() < 1e-12);
    assert_eq!(z[l.param_offset()], 10.0);
    assert_eq!(z[l.control_offset(0)], 0.0);
}

#[test]
fn shooting_modes_agree_on_consistent_points() {
    let ms = Nlp::new(rocket(false), options(Transcription::MultipleShooting)).unwrap();
    let ss = Nlp::new(rocket(false), options(Transcription::SingleShooting)).unwrap();

    let mut z_ms = ms.initial_guess();
    let lm = *ms.layout();
    for k in 0..lm.intervals {
        z_ms[lm.control_offset(k)] = 0.3 + 0.1 * k as f64;
    }
    let z_ms = ms.simulate_guess(&z_ms).unwrap();

    let ls = *ss.layout();
    let mut z_ss = DVector::zeros(ls.len());
    z_ss.rows_mut(0, 3).copy_from(&z_ms.rows(0, 3));
    for k in 0..ls.intervals {
        z_ss[ls.control_offset(k)] = z_ms[lm.control_offset(k)];
    }
    z_ss[ls.param_offset()] = z_ms[lm.param_offset()];

    let a = ms.evaluate(&z_ms).unwrap();
    let b = ss.evaluate(&z_ss).unwrap();
    assert!(a.eq.rows(0, 12).amax() < 1e-12);
    assert!((a.objective - b.objective).abs() < 1e-10);

    let ta = ms.trajectory(&z_ms).unwrap();
    let tb = ss.trajectory(&z_ss).unwrap();
    for (xa, xb) in ta.states.iter().zip(&tb.states) {
        assert!((xa - xb).amax() < 1e-12);
    }
    assert_eq!(ta.intermediates[0].len(), 1);
}

#[test]
fn shift_duplicates_last_block() {
    let nlp = Nlp::new(rocket(true), options(Transcription::MultipleShooting)).unwrap();
    let l = *nlp.layout();
    let z = DVector::from_fn(l.len(), |i, _| i as f64);
    let shifted = nlp.shift(&z, 1).unwrap();
    for k in 0..l.intervals {
        let src = (k + 1).min(l.intervals - 1);
        assert_eq!(shifted[l.control_offset(k)], z[l.control_offset(src)]);
    }
    for k in 0..=l.intervals {
        let src = (k + 1).min(l.intervals);
        let dst = l.state_offset(k).unwrap();
        let from = l.state_offset(src).unwrap();
        assert_eq!(shifted.rows(dst, 3), z.rows(from, 3));
    }
    assert_eq!(shifted[l.param_offset()], z[l.param_offset()]);
}

#[test]
fn parallel_integration_is_deterministic() {
    let serial = Nlp::new(rocket(false), options(Transcription::MultipleShooting)).unwrap();
    let parallel = Nlp::new(
        rocket(false),
        TranscriptionOptions {
            parallel: true,
            ..options(Transcription::MultipleShooting)
        },
    )
    .unwrap();
    let z = perturbed_point(&serial);
    assert_eq!(serial.evaluate(&z).unwrap(), parallel.evaluate(&z).unwrap());
}
