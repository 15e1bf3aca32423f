//! Stable C ABI for host branch-and-bound solvers.
//!
//! The handle returned by [`setup`] owns one heuristic driver for one
//! problem instance. All arrays are caller-owned double-precision buffers of
//! length `n_cols`; strings are UTF-8 and NUL-terminated. No panics cross
//! this boundary in release builds: every failure maps to a status code.

use std::ffi::CStr;

use libc::{c_char, c_double, c_int, c_void};
use log::{debug, error, info};

use crate::convert::problem_from_instance;
use crate::heuristic::{
    FixAndPropagateOptions, Heuristic, InfeasibleCopyStrategy, OneOptMode,
};
use crate::num::Num;
use crate::params::AlgorithmParameter;
use crate::presolve::{trivial_presolve, PresolveStatus};

pub const SETUP_OK: c_int = 0;
pub const SETUP_INVALID_FILENAME: c_int = -1;
pub const SETUP_PARSE_ERROR: c_int = -2;
pub const SETUP_PRESOLVE_CONCLUSIVE: c_int = -3;

struct HeuristicHandle {
    heuristic: Heuristic,
}

fn verbosity_to_level(verbosity_level: c_int) -> log::LevelFilter {
    match verbosity_level {
        i if i <= 0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Loads `filename`, presolves once and builds a heuristic driver.
/// Returns an opaque handle, or NULL with `*result` set to a negative code.
///
/// # Safety
///
/// `filename` must be a valid NUL-terminated string and `result` a valid
/// pointer.
#[no_mangle]
pub unsafe extern "C" fn setup(
    filename: *const c_char,
    result: *mut c_int,
    verbosity_level: c_int,
    current_time_stamp: c_double,
    add_cutoff_constraint: c_int,
) -> *mut c_void {
    log::set_max_level(verbosity_to_level(verbosity_level));
    debug!("setup called at host time {}", current_time_stamp);

    if filename.is_null() || result.is_null() {
        if !result.is_null() {
            *result = SETUP_INVALID_FILENAME;
        }
        return std::ptr::null_mut();
    }
    let filename = match CStr::from_ptr(filename).to_str() {
        Ok(s) => s,
        Err(_) => {
            *result = SETUP_INVALID_FILENAME;
            return std::ptr::null_mut();
        }
    };

    let instance = match mipio::read_instance(std::path::Path::new(filename)) {
        Ok(instance) => instance,
        Err(e) => {
            error!("could not read {}: {}", filename, e);
            *result = SETUP_PARSE_ERROR;
            return std::ptr::null_mut();
        }
    };

    let num = Num::default();
    let mut problem = problem_from_instance(&instance);
    match trivial_presolve(&mut problem, num) {
        PresolveStatus::Infeasible | PresolveStatus::Unbounded => {
            info!("presolve detected infeasibility or unboundedness");
            *result = SETUP_PRESOLVE_CONCLUSIVE;
            return std::ptr::null_mut();
        }
        PresolveStatus::Unchanged | PresolveStatus::Reduced => {}
    }

    let mut heuristic = Heuristic::new(
        problem,
        num,
        AlgorithmParameter::default(),
        add_cutoff_constraint != 0,
    );
    heuristic.setup();

    *result = SETUP_OK;
    Box::into_raw(Box::new(HeuristicHandle { heuristic })) as *mut c_void
}

/// Destroys a handle created by [`setup`].
///
/// # Safety
///
/// `heuristic_void_ptr` must be a pointer returned by [`setup`] that has not
/// been deleted yet, or NULL.
#[no_mangle]
pub unsafe extern "C" fn delete_problem_instance(heuristic_void_ptr: *mut c_void) {
    if !heuristic_void_ptr.is_null() {
        drop(Box::from_raw(heuristic_void_ptr as *mut HeuristicHandle));
    }
}

/// Runs fix-and-propagate (and optionally 1-opt) from the host's fractional
/// point. Returns 1 when a strictly better integer-feasible solution was
/// written to `result` and `current_obj_value` was overwritten. With
/// `apply_conflicts` set, no-good rows learned from failed dives are
/// buffered and merged into the problem once more than `flush_threshold`
/// of them are pending.
///
/// # Safety
///
/// All pointers must be valid; the array arguments must have length
/// `n_cols` matching the loaded problem.
#[no_mangle]
pub unsafe extern "C" fn call_algorithm(
    heuristic_void_ptr: *mut c_void,
    cont_solution: *const c_double,
    result: *mut c_double,
    n_cols: c_int,
    current_obj_value: *mut c_double,
    infeasible_copy_strategy: c_int,
    apply_conflicts: c_int,
    flush_threshold: c_int,
    max_backtracks: c_int,
    perform_one_opt: c_int,
    remaining_time_in_sec: c_double,
) -> c_int {
    if heuristic_void_ptr.is_null()
        || cont_solution.is_null()
        || result.is_null()
        || current_obj_value.is_null()
    {
        return 0;
    }
    let handle = &mut *(heuristic_void_ptr as *mut HeuristicHandle);
    let n = handle.heuristic.problem().n_cols();
    if n_cols as usize != n {
        error!(
            "call_algorithm: expected {} columns, got {}",
            n, n_cols
        );
        return 0;
    }

    handle.heuristic.restart_timer(remaining_time_in_sec);
    let x_ref = std::slice::from_raw_parts(cont_solution, n);
    let out = std::slice::from_raw_parts_mut(result, n);

    let mut best_obj = *current_obj_value;
    let mut best_sol = Vec::new();
    let options = FixAndPropagateOptions {
        one_opt_mode: OneOptMode::from_int(perform_one_opt),
        apply_conflicts: apply_conflicts != 0,
        conflict_flush_threshold: flush_threshold.max(0) as usize,
        max_backtracks: max_backtracks.max(0) as usize,
    };

    let found = handle
        .heuristic
        .perform_fix_and_propagate(x_ref, &mut best_obj, &mut best_sol, options);

    if found {
        out.copy_from_slice(&best_sol);
        *current_obj_value = best_obj;
        return 1;
    }
    if handle.heuristic.all_replicas_infeasible() {
        let strategy = InfeasibleCopyStrategy::from_int(infeasible_copy_strategy);
        if let Some(candidate) = handle.heuristic.infeasible_candidate(strategy) {
            out.copy_from_slice(candidate);
        }
    }
    0
}

/// Applies 1-opt to a caller-supplied feasible solution in place.
///
/// # Safety
///
/// All pointers must be valid; `sol` must have length `n_cols` matching the
/// loaded problem.
#[no_mangle]
pub unsafe extern "C" fn perform_one_opt(
    heuristic_void_ptr: *mut c_void,
    sol: *mut c_double,
    n_cols: c_int,
    perform_opt_one: c_int,
    current_obj_value: *mut c_double,
    remaining_time_in_sec: c_double,
) {
    if heuristic_void_ptr.is_null() || sol.is_null() || current_obj_value.is_null() {
        return;
    }
    let handle = &mut *(heuristic_void_ptr as *mut HeuristicHandle);
    let n = handle.heuristic.problem().n_cols();
    if n_cols as usize != n {
        error!("perform_one_opt: expected {} columns, got {}", n, n_cols);
        return;
    }

    handle.heuristic.restart_timer(remaining_time_in_sec);
    let solution = std::slice::from_raw_parts_mut(sol, n);
    let mut obj = *current_obj_value;
    handle
        .heuristic
        .one_opt_on(solution, OneOptMode::from_int(perform_opt_one), &mut obj);
    *current_obj_value = obj;
}

/// Runs fix-and-propagate without a continuous hint. Returns 1 when a
/// solution better than `*current_obj_value` was written to `result`.
///
/// # Safety
///
/// All pointers must be valid; `result` must have the problem's column
/// count.
#[no_mangle]
pub unsafe extern "C" fn call_simple_heuristic(
    heuristic_void_ptr: *mut c_void,
    result: *mut c_double,
    current_obj_value: *mut c_double,
) -> c_int {
    if heuristic_void_ptr.is_null() || result.is_null() || current_obj_value.is_null() {
        return 0;
    }
    let handle = &mut *(heuristic_void_ptr as *mut HeuristicHandle);
    let n = handle.heuristic.problem().n_cols();
    let out = std::slice::from_raw_parts_mut(result, n);

    let mut best_obj = *current_obj_value;
    let mut best_sol = Vec::new();
    if handle.heuristic.run_simple(&mut best_obj, &mut best_sol) {
        out.copy_from_slice(&best_sol);
        *current_obj_value = best_obj;
        1
    } else {
        0
    }
}
