//! A trivial presolve pass.
//!
//! Establishes the state the heuristic relies on: integer bounds are rounded
//! inward, every row's activity range exists and rows that can never be
//! violated are flagged redundant. Obvious infeasibility and unboundedness
//! are detected so the caller can short-circuit.

use log::info;

use crate::num::Num;
use crate::problem::{ColFlags, Problem, RowFlags};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresolveStatus {
    Unchanged,
    Reduced,
    Infeasible,
    Unbounded,
}

pub fn trivial_presolve(problem: &mut Problem, num: Num) -> PresolveStatus {
    let mut reduced = false;

    // round integer bounds inward
    for col in 0..problem.n_cols() {
        if !problem.is_integral(col) {
            continue;
        }
        let flags = problem.col_flags()[col];
        if !flags.test(ColFlags::LB_INF) {
            let lb = problem.lower_bounds()[col];
            let rounded = num.feas_ceil(lb);
            if rounded != lb {
                problem.lower_bounds_mut()[col] = rounded;
                reduced = true;
            }
        }
        if !flags.test(ColFlags::UB_INF) {
            let ub = problem.upper_bounds()[col];
            let rounded = num.feas_floor(ub);
            if rounded != ub {
                problem.upper_bounds_mut()[col] = rounded;
                reduced = true;
            }
        }
        let flags = problem.col_flags()[col];
        if !flags.test(ColFlags::LB_INF)
            && !flags.test(ColFlags::UB_INF)
            && num.is_feas_gt(problem.lower_bounds()[col], problem.upper_bounds()[col])
        {
            info!("presolve: empty domain for column {}", col);
            return PresolveStatus::Infeasible;
        }
    }

    // objective unboundedness: an improving direction that no row limits
    for col in 0..problem.n_cols() {
        let obj = problem.objective()[col];
        if num.is_zero(obj) {
            continue;
        }
        let flags = problem.col_flags()[col];
        let unbounded_direction = if obj > 0.0 {
            flags.test(ColFlags::LB_INF)
        } else {
            flags.test(ColFlags::UB_INF)
        };
        if unbounded_direction && problem.matrix().col_entries(col).0.is_empty() {
            info!("presolve: objective unbounded through column {}", col);
            return PresolveStatus::Unbounded;
        }
    }

    // initialise activities, flag redundant rows, detect conflicting rows
    for row in 0..problem.n_rows() {
        let activity = problem.row_activity(
            row,
            problem.lower_bounds(),
            problem.upper_bounds(),
            problem.col_flags(),
        );
        let flags = problem.matrix().row_flags()[row];
        let lhs = problem.matrix().lhs()[row];
        let rhs = problem.matrix().rhs()[row];
        let lhs_finite = !flags.test(RowFlags::LHS_INF);
        let rhs_finite = !flags.test(RowFlags::RHS_INF);

        if rhs_finite && activity.ninf_min == 0 && num.is_feas_gt(activity.min, rhs) {
            info!("presolve: row {} cannot reach its right-hand side", row);
            return PresolveStatus::Infeasible;
        }
        if lhs_finite && activity.ninf_max == 0 && num.is_feas_lt(activity.max, lhs) {
            info!("presolve: row {} cannot reach its left-hand side", row);
            return PresolveStatus::Infeasible;
        }

        let lhs_safe =
            !lhs_finite || (activity.ninf_min == 0 && num.is_feas_ge(activity.min, lhs));
        let rhs_safe =
            !rhs_finite || (activity.ninf_max == 0 && num.is_feas_le(activity.max, rhs));
        if lhs_safe && rhs_safe && !flags.test(RowFlags::REDUNDANT) {
            problem.matrix_mut().mark_redundant(row);
            reduced = true;
        }
    }

    if reduced {
        PresolveStatus::Reduced
    } else {
        PresolveStatus::Unchanged
    }
}
