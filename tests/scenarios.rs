//! End-to-end scenarios exercising the public surface: file parsing,
//! conversion, presolve, the heuristic driver and the C ABI.

use std::ffi::CString;

use volfix::capi;
use volfix::convert::problem_from_instance;
use volfix::dive::FixAndPropagate;
use volfix::heuristic::{FixAndPropagateOptions, Heuristic, OneOptMode};
use volfix::num::Num;
use volfix::params::AlgorithmParameter;
use volfix::presolve::{trivial_presolve, PresolveStatus};
use volfix::probing::ProbingView;
use volfix::problem::ProblemBuilder;
use volfix::rounding::FractionalRounding;
use volfix::util::Timer;
use volfix::volume::VolumeAlgorithm;

const COVER_MPS: &str = "NAME          cover
ROWS
 N  COST
 G  C1
COLUMNS
    MARKER                 'MARKER'                 'INTORG'
    X1        COST         3.0        C1           1.0
    X2        COST         -5.0
    X2        C1           1.0
    MARKER                 'MARKER'                 'INTEND'
RHS
    RHS       C1           1.0
BOUNDS
 UP BND       X1           1.0
 UP BND       X2           1.0
ENDATA
";

fn cover_heuristic(threads: usize, time_limit: f64) -> Heuristic {
    let instance = mipio::parse(COVER_MPS.as_bytes()).unwrap();
    let mut problem = problem_from_instance(&instance);
    let num = Num::default();
    assert_ne!(
        trivial_presolve(&mut problem, num),
        PresolveStatus::Infeasible
    );
    let mut parameter = AlgorithmParameter::default();
    parameter.threads = threads;
    parameter.time_limit = time_limit;
    let mut heuristic = Heuristic::new(problem, num, parameter, false);
    heuristic.setup();
    heuristic
}

#[test]
fn parsed_instance_solves_to_a_verified_solution() {
    let instance = mipio::parse(COVER_MPS.as_bytes()).unwrap();
    let mut heuristic = cover_heuristic(4, 10.0);

    let mut best_obj = f64::INFINITY;
    let mut best_sol = Vec::new();
    let found = heuristic.perform_fix_and_propagate(
        &[0.5, 0.5],
        &mut best_obj,
        &mut best_sol,
        FixAndPropagateOptions {
            one_opt_mode: OneOptMode::WithRepair,
            ..FixAndPropagateOptions::default()
        },
    );
    assert!(found);
    assert_eq!(best_obj, -5.0);

    // the produced vector satisfies the original file within tolerances
    mipio::check_values(
        &instance,
        &best_sol,
        mipio::DEFAULT_INT_TOLERANCE,
        mipio::DEFAULT_EQ_TOLERANCE,
    )
    .unwrap();
}

#[test]
fn repeated_runs_are_deterministic() {
    let run = || {
        let mut heuristic = cover_heuristic(4, 10.0);
        let mut best_obj = f64::INFINITY;
        let mut best_sol = Vec::new();
        heuristic.perform_fix_and_propagate(
            &[0.7, 0.3],
            &mut best_obj,
            &mut best_sol,
            FixAndPropagateOptions::default(),
        );
        (best_obj, best_sol)
    };
    assert_eq!(run(), run());
}

#[test]
fn zero_time_limit_returns_promptly() {
    let start = std::time::Instant::now();
    let num = Num::default();

    // a dive whose deadline is already over must not take a single decision
    let instance = mipio::parse(COVER_MPS.as_bytes()).unwrap();
    let problem = problem_from_instance(&instance);
    let mut view = ProbingView::new(&problem, num);
    view.set_deadline(Some(Timer::new(0.0).deadline()));
    let mut strategy = FractionalRounding::new(num);
    let engine = FixAndPropagate::new(num);
    let mut result = vec![0.0; 2];
    let mut backtracks = 0;
    let infeasible = engine.fix_and_propagate(
        &problem,
        &[0.5, 0.5],
        &mut result,
        &mut strategy,
        &mut view,
        &mut backtracks,
        true,
        false,
        1,
    );
    assert!(infeasible);
    assert!(view.get_fixings().is_empty());

    // an instance the volume loop would iterate on ...
    let mut builder = ProblemBuilder::new("ray");
    builder.add_col(Some(0.0), Some(1.0), true, 1.0);
    builder.add_row(Some(1.0), None, &[(0, 1.0)]);
    let lp = builder.build();
    let b = lp.matrix().lhs().to_vec();
    let mut generous = VolumeAlgorithm::new(num, Timer::new(10.0), AlgorithmParameter::default());
    let _ = generous.volume_algorithm(
        lp.objective(),
        lp.matrix(),
        &b,
        lp.lower_bounds(),
        lp.upper_bounds(),
        lp.col_flags(),
        &[0.0],
        1,
        1.0,
    );
    assert!(generous.rounds_performed() > 1);

    // ... stops at the very first stopping check once the budget is spent
    let mut expired = VolumeAlgorithm::new(num, Timer::new(0.0), AlgorithmParameter::default());
    let _ = expired.volume_algorithm(
        lp.objective(),
        lp.matrix(),
        &b,
        lp.lower_bounds(),
        lp.upper_bounds(),
        lp.col_flags(),
        &[0.0],
        1,
        1.0,
    );
    assert_eq!(expired.rounds_performed(), 1);

    // the driver entry points inherit the prompt return end to end
    let mut heuristic = cover_heuristic(4, 0.0);
    let _ = heuristic.compute_fractional_hint(None);
    let mut best_obj = f64::INFINITY;
    let mut best_sol = Vec::new();
    let found = heuristic.perform_fix_and_propagate(
        &[0.5, 0.5],
        &mut best_obj,
        &mut best_sol,
        FixAndPropagateOptions::default(),
    );
    assert!(!found);
    assert!(best_sol.is_empty());
    assert!(start.elapsed().as_secs_f64() < 0.25);
}

#[test]
fn c_abi_round_trip() {
    let path = std::env::temp_dir().join("volfix_capi_cover.mps");
    std::fs::write(&path, COVER_MPS).unwrap();
    let filename = CString::new(path.to_str().unwrap()).unwrap();

    unsafe {
        let mut status = -99;
        let handle = capi::setup(filename.as_ptr(), &mut status, 0, 0.0, 0);
        assert_eq!(status, capi::SETUP_OK);
        assert!(!handle.is_null());

        // simple heuristic: no hint needed
        let mut result = vec![0.0f64; 2];
        let mut obj = f64::INFINITY;
        let found = capi::call_simple_heuristic(handle, result.as_mut_ptr(), &mut obj);
        assert_eq!(found, 1);
        assert!(result[0] + result[1] >= 1.0 - 1e-6);

        // full algorithm from a fractional point, 1-opt enabled
        let cont = vec![0.9f64, 0.1];
        let mut better = vec![0.0f64; 2];
        let mut current_obj = 1.0e20;
        let improved = capi::call_algorithm(
            handle,
            cont.as_ptr(),
            better.as_mut_ptr(),
            2,
            &mut current_obj,
            0,
            1,
            100,
            1,
            2,
            10.0,
        );
        assert_eq!(improved, 1);
        assert_eq!(current_obj, -5.0);
        assert_eq!(better, vec![0.0, 1.0]);

        // 1-opt entry point repairs a mediocre solution in place
        let mut sol = vec![1.0f64, 0.0];
        let mut sol_obj = 3.0;
        capi::perform_one_opt(handle, sol.as_mut_ptr(), 2, 2, &mut sol_obj, 10.0);
        assert_eq!(sol, vec![0.0, 1.0]);
        assert_eq!(sol_obj, -5.0);

        // wrong column count is rejected
        let rejected = capi::call_algorithm(
            handle,
            cont.as_ptr(),
            better.as_mut_ptr(),
            3,
            &mut current_obj,
            0,
            0,
            100,
            1,
            0,
            10.0,
        );
        assert_eq!(rejected, 0);

        capi::delete_problem_instance(handle);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn setup_rejects_missing_files() {
    let filename = CString::new("/nonexistent/volfix_missing.mps").unwrap();
    unsafe {
        let mut status = 0;
        let handle = capi::setup(filename.as_ptr(), &mut status, 0, 0.0, 0);
        assert!(handle.is_null());
        assert_eq!(status, capi::SETUP_PARSE_ERROR);
    }
}

#[test]
fn presolve_conclusive_instances_are_reported() {
    const INFEASIBLE_MPS: &str = "NAME          infeasible
ROWS
 N  COST
 G  C1
COLUMNS
    MARKER                 'MARKER'                 'INTORG'
    X1        COST         1.0        C1           1.0
    MARKER                 'MARKER'                 'INTEND'
RHS
    RHS       C1           2.0
BOUNDS
 UP BND       X1           1.0
ENDATA
";
    let path = std::env::temp_dir().join("volfix_capi_infeasible.mps");
    std::fs::write(&path, INFEASIBLE_MPS).unwrap();
    let filename = CString::new(path.to_str().unwrap()).unwrap();
    unsafe {
        let mut status = 0;
        let handle = capi::setup(filename.as_ptr(), &mut status, 0, 0.0, 0);
        assert!(handle.is_null());
        assert_eq!(status, capi::SETUP_PRESOLVE_CONCLUSIVE);
    }
    let _ = std::fs::remove_file(&path);
}
