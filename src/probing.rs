//! A reversible view over the variable domains of a problem.
//!
//! The view overlays its own bounds on top of the problem, keeps per-row
//! activity caches in sync with every bound change, and records all changes
//! on a trail so that conflict analysis can replay the derivation. Each
//! heuristic replica owns exactly one view and `reset()` returns it to the
//! problem's original state.

use std::collections::VecDeque;
use std::time::Instant;

use crate::num::Num;
use crate::problem::{ActivityRange, ColFlags, Problem, RowFlags};

/// Reason marker for bound changes made by a decision rather than by
/// propagating a row.
pub const NO_REASON: i32 = -1;

/// A decision: fix `col` to `value`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fixing {
    col: usize,
    value: f64,
}

impl Fixing {
    pub fn new(col: usize, value: f64) -> Fixing {
        Fixing { col, value }
    }

    pub fn column(&self) -> usize {
        self.col
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

/// One entry of the bound-change trail.
#[derive(Clone, Copy, Debug)]
pub struct BoundChange {
    pub col: usize,
    pub value: f64,
    /// Index of the propagating row, or [`NO_REASON`] for a decision.
    pub reason_row: i32,
    pub is_lower: bool,
    pub is_upper: bool,
    pub level: u32,
}

pub struct ProbingView {
    num: Num,
    lower: Vec<f64>,
    upper: Vec<f64>,
    flags: Vec<ColFlags>,
    activities: Vec<ActivityRange>,
    queue: VecDeque<usize>,
    in_queue: Vec<bool>,
    trail: Vec<BoundChange>,
    fixings: Vec<Fixing>,
    infeasible: bool,
    conflict_row: i32,
    decision_level: u32,
    deadline: Option<Instant>,
}

impl ProbingView {
    pub fn new(problem: &Problem, num: Num) -> ProbingView {
        let mut view = ProbingView {
            num,
            lower: Vec::new(),
            upper: Vec::new(),
            flags: Vec::new(),
            activities: Vec::new(),
            queue: VecDeque::new(),
            in_queue: Vec::new(),
            trail: Vec::new(),
            fixings: Vec::new(),
            infeasible: false,
            conflict_row: NO_REASON,
            decision_level: 0,
            deadline: None,
        };
        view.reset(problem);
        view
    }

    /// Restores the problem's original bounds, clears the trail and the
    /// propagation queue, and re-derives the activity caches.
    pub fn reset(&mut self, problem: &Problem) {
        self.lower.clear();
        self.lower.extend_from_slice(problem.lower_bounds());
        self.upper.clear();
        self.upper.extend_from_slice(problem.upper_bounds());
        self.flags.clear();
        self.flags.extend_from_slice(problem.col_flags());

        self.activities.clear();
        for row in 0..problem.n_rows() {
            self.activities
                .push(problem.row_activity(row, &self.lower, &self.upper, &self.flags));
        }

        self.queue.clear();
        self.in_queue.clear();
        self.in_queue.resize(problem.n_rows(), false);
        self.trail.clear();
        self.fixings.clear();
        self.infeasible = false;
        self.conflict_row = NO_REASON;
        self.decision_level = 0;
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    pub fn deadline_expired(&self) -> bool {
        self.deadline
            .map(|d| Instant::now() >= d)
            .unwrap_or(false)
    }

    pub fn is_infeasible(&self) -> bool {
        self.infeasible
    }

    /// Row whose propagation detected the conflict, if any.
    pub fn conflict_row(&self) -> Option<usize> {
        (self.conflict_row >= 0).then(|| self.conflict_row as usize)
    }

    pub fn decision_level(&self) -> u32 {
        self.decision_level
    }

    pub fn get_fixings(&self) -> &[Fixing] {
        &self.fixings
    }

    pub fn get_trail(&self) -> &[BoundChange] {
        &self.trail
    }

    pub fn probing_lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn probing_upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    pub fn probing_flags(&self) -> &[ColFlags] {
        &self.flags
    }

    pub fn is_integer_variable(&self, col: usize) -> bool {
        self.flags[col].test(ColFlags::INTEGRAL)
    }

    pub fn lb_inf(&self, col: usize) -> bool {
        self.flags[col].test(ColFlags::LB_INF)
    }

    pub fn ub_inf(&self, col: usize) -> bool {
        self.flags[col].test(ColFlags::UB_INF)
    }

    /// Both bounds finite and equal up to the feasibility tolerance.
    pub fn is_fixed(&self, col: usize) -> bool {
        !self.lb_inf(col)
            && !self.ub_inf(col)
            && self.num.is_feas_eq(self.lower[col], self.upper[col])
    }

    pub fn is_within_bounds(&self, col: usize, value: f64) -> bool {
        (self.lb_inf(col) || self.num.is_feas_ge(value, self.lower[col]))
            && (self.ub_inf(col) || self.num.is_feas_le(value, self.upper[col]))
    }

    /// Fixes `col` to `value` as a decision: bumps the decision level,
    /// records the fixing and enqueues the affected rows. Propagation is a
    /// separate step.
    pub fn set_probing_column(&mut self, problem: &Problem, col: usize, value: f64) {
        debug_assert!(col < self.lower.len());
        self.decision_level += 1;
        self.fixings.push(Fixing::new(col, value));
        self.tighten_lower(problem, col, value, NO_REASON);
        if !self.infeasible {
            self.tighten_upper(problem, col, value, NO_REASON);
        }
    }

    /// Drains the propagation queue. For every pending row the cached
    /// activity bounds are compared against the row sides; interval
    /// arithmetic over the remaining free variables then tightens individual
    /// column bounds. Stops as soon as a conflict is found.
    pub fn propagate_domains(&mut self, problem: &Problem) {
        while let Some(row) = self.queue.pop_front() {
            self.in_queue[row] = false;
            if self.infeasible || self.deadline_expired() {
                return;
            }
            self.propagate_row(problem, row);
        }
    }

    fn propagate_row(&mut self, problem: &Problem, row: usize) {
        let row_flags = problem.matrix().row_flags()[row];
        if row_flags.test(RowFlags::REDUNDANT) {
            return;
        }
        let lhs = problem.matrix().lhs()[row];
        let rhs = problem.matrix().rhs()[row];
        let lhs_finite = !row_flags.test(RowFlags::LHS_INF);
        let rhs_finite = !row_flags.test(RowFlags::RHS_INF);
        let act = self.activities[row];

        if rhs_finite && act.ninf_min == 0 && self.num.is_feas_gt(act.min, rhs) {
            self.infeasible = true;
            self.conflict_row = row as i32;
            return;
        }
        if lhs_finite && act.ninf_max == 0 && self.num.is_feas_lt(act.max, lhs) {
            self.infeasible = true;
            self.conflict_row = row as i32;
            return;
        }

        let (cols, vals) = problem.matrix().row_entries(row);
        for k in 0..cols.len() {
            let col = cols[k];
            let a = vals[k];
            if self.num.is_zero(a) {
                continue;
            }

            if rhs_finite {
                if let Some(rest) = self.rest_min_activity(row, col, a) {
                    let bound = (rhs - rest) / a;
                    if a > 0.0 {
                        self.tighten_upper(problem, col, bound, row as i32);
                    } else {
                        self.tighten_lower(problem, col, bound, row as i32);
                    }
                }
            }
            if self.infeasible {
                return;
            }
            if lhs_finite {
                if let Some(rest) = self.rest_max_activity(row, col, a) {
                    let bound = (lhs - rest) / a;
                    if a > 0.0 {
                        self.tighten_lower(problem, col, bound, row as i32);
                    } else {
                        self.tighten_upper(problem, col, bound, row as i32);
                    }
                }
            }
            if self.infeasible {
                return;
            }
        }
    }

    /// Minimum activity of `row` with the contribution of `col` removed.
    /// `None` when the rest is unbounded below.
    fn rest_min_activity(&self, row: usize, col: usize, a: f64) -> Option<f64> {
        let act = &self.activities[row];
        let col_inf = if a > 0.0 {
            self.lb_inf(col)
        } else {
            self.ub_inf(col)
        };
        match (act.ninf_min, col_inf) {
            (0, false) => {
                let contribution = if a > 0.0 {
                    a * self.lower[col]
                } else {
                    a * self.upper[col]
                };
                Some(act.min - contribution)
            }
            (1, true) => Some(act.min),
            _ => None,
        }
    }

    /// Maximum activity of `row` with the contribution of `col` removed.
    /// `None` when the rest is unbounded above.
    fn rest_max_activity(&self, row: usize, col: usize, a: f64) -> Option<f64> {
        let act = &self.activities[row];
        let col_inf = if a > 0.0 {
            self.ub_inf(col)
        } else {
            self.lb_inf(col)
        };
        match (act.ninf_max, col_inf) {
            (0, false) => {
                let contribution = if a > 0.0 {
                    a * self.upper[col]
                } else {
                    a * self.lower[col]
                };
                Some(act.max - contribution)
            }
            (1, true) => Some(act.max),
            _ => None,
        }
    }

    fn tighten_lower(&mut self, problem: &Problem, col: usize, mut value: f64, reason: i32) {
        if self.flags[col].test(ColFlags::INTEGRAL) {
            value = self.num.feas_ceil(value);
        }
        let was_inf = self.lb_inf(col);
        // only accept tightenings that strengthen the bound measurably
        if !was_inf && value < self.lower[col] + self.num.feastol() {
            return;
        }

        self.trail.push(BoundChange {
            col,
            value,
            reason_row: reason,
            is_lower: true,
            is_upper: false,
            level: self.decision_level,
        });

        let old = self.lower[col];
        let (rows, vals) = problem.matrix().col_entries(col);
        for (&row, &a) in rows.iter().zip(vals) {
            let act = &mut self.activities[row];
            if a > 0.0 {
                if was_inf {
                    act.ninf_min -= 1;
                    act.min += a * value;
                } else {
                    act.min += a * (value - old);
                }
            } else if was_inf {
                act.ninf_max -= 1;
                act.max += a * value;
            } else {
                act.max += a * (value - old);
            }
            if !self.in_queue[row] {
                self.in_queue[row] = true;
                self.queue.push_back(row);
            }
        }

        self.lower[col] = value;
        self.flags[col].unset(ColFlags::LB_INF);

        if !self.ub_inf(col) && self.num.is_feas_gt(value, self.upper[col]) {
            self.infeasible = true;
            self.conflict_row = reason;
        }
    }

    fn tighten_upper(&mut self, problem: &Problem, col: usize, mut value: f64, reason: i32) {
        if self.flags[col].test(ColFlags::INTEGRAL) {
            value = self.num.feas_floor(value);
        }
        let was_inf = self.ub_inf(col);
        if !was_inf && value > self.upper[col] - self.num.feastol() {
            return;
        }

        self.trail.push(BoundChange {
            col,
            value,
            reason_row: reason,
            is_lower: false,
            is_upper: true,
            level: self.decision_level,
        });

        let old = self.upper[col];
        let (rows, vals) = problem.matrix().col_entries(col);
        for (&row, &a) in rows.iter().zip(vals) {
            let act = &mut self.activities[row];
            if a > 0.0 {
                if was_inf {
                    act.ninf_max -= 1;
                    act.max += a * value;
                } else {
                    act.max += a * (value - old);
                }
            } else if was_inf {
                act.ninf_min -= 1;
                act.min += a * value;
            } else {
                act.min += a * (value - old);
            }
            if !self.in_queue[row] {
                self.in_queue[row] = true;
                self.queue.push_back(row);
            }
        }

        self.upper[col] = value;
        self.flags[col].unset(ColFlags::UB_INF);

        if !self.lb_inf(col) && self.num.is_feas_lt(value, self.lower[col]) {
            self.infeasible = true;
            self.conflict_row = reason;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;

    /// x1 + x2 + x3 + x4 = 2 with x1..x3 binary and x4 in [0, 3].
    fn cardinality_problem() -> Problem {
        let mut builder = ProblemBuilder::new("cardinality");
        for _ in 0..3 {
            builder.add_col(Some(0.0), Some(1.0), true, 1.0);
        }
        builder.add_col(Some(0.0), Some(3.0), true, 1.0);
        builder.add_row(
            Some(2.0),
            Some(2.0),
            &[(0, 1.0), (1, 1.0), (2, 1.0), (3, 1.0)],
        );
        builder.build()
    }

    #[test]
    fn propagation_tightens_upper_bound() {
        let problem = cardinality_problem();
        let mut view = ProbingView::new(&problem, Num::default());

        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);

        assert!(!view.is_infeasible());
        // x4 can contribute at most 1 now; x2 and x3 stay free
        assert_eq!(view.probing_upper_bounds()[3], 1.0);
        assert_eq!(view.probing_upper_bounds()[1], 1.0);
        assert_eq!(view.probing_lower_bounds()[1], 0.0);
        assert_eq!(view.probing_upper_bounds()[2], 1.0);
        assert_eq!(view.probing_lower_bounds()[2], 0.0);

        // trail: the decision on x1 plus the derived bound on x4
        let trail = view.get_trail();
        assert_eq!(trail[0].col, 0);
        assert_eq!(trail[0].reason_row, NO_REASON);
        assert_eq!(trail[0].level, 1);
        let derived: Vec<_> = trail.iter().filter(|bc| bc.reason_row == 0).collect();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].col, 3);
        assert_eq!(derived[0].value, 1.0);
        assert!(derived[0].is_upper);
    }

    #[test]
    fn reset_restores_original_bounds_exactly() {
        let problem = cardinality_problem();
        let mut view = ProbingView::new(&problem, Num::default());

        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);
        view.reset(&problem);

        assert_eq!(view.probing_lower_bounds(), problem.lower_bounds());
        assert_eq!(view.probing_upper_bounds(), problem.upper_bounds());
        assert!(view.get_trail().is_empty());
        assert!(view.get_fixings().is_empty());
        assert_eq!(view.decision_level(), 0);
        assert!(!view.is_infeasible());
    }

    #[test]
    fn reset_and_replay_reaches_the_same_state() {
        let problem = cardinality_problem();
        let mut view = ProbingView::new(&problem, Num::default());

        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);
        view.set_probing_column(&problem, 1, 1.0);
        view.propagate_domains(&problem);
        let first_lower = view.probing_lower_bounds().to_vec();
        let first_upper = view.probing_upper_bounds().to_vec();

        view.reset(&problem);
        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);
        view.set_probing_column(&problem, 1, 1.0);
        view.propagate_domains(&problem);

        assert_eq!(view.probing_lower_bounds(), &first_lower[..]);
        assert_eq!(view.probing_upper_bounds(), &first_upper[..]);
    }

    #[test]
    fn fixing_both_ones_forces_rest_to_zero() {
        let problem = cardinality_problem();
        let mut view = ProbingView::new(&problem, Num::default());

        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);
        view.set_probing_column(&problem, 1, 1.0);
        view.propagate_domains(&problem);

        assert!(!view.is_infeasible());
        assert_eq!(view.probing_upper_bounds()[2], 0.0);
        assert_eq!(view.probing_upper_bounds()[3], 0.0);
    }

    #[test]
    fn detects_infeasibility() {
        // x1 + x2 >= 3 over two binaries is infeasible once both hit 1
        let mut builder = ProblemBuilder::new("infeasible");
        builder.add_col(Some(0.0), Some(1.0), true, 0.0);
        builder.add_col(Some(0.0), Some(1.0), true, 0.0);
        builder.add_row(Some(3.0), None, &[(0, 1.0), (1, 1.0)]);
        let problem = builder.build();

        let mut view = ProbingView::new(&problem, Num::default());
        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);
        assert!(view.is_infeasible());
        assert_eq!(view.conflict_row(), Some(0));
    }

    #[test]
    fn derived_bounds_are_sound() {
        // every propagated trail entry must be implied by its reason row
        let problem = cardinality_problem();
        let mut view = ProbingView::new(&problem, Num::default());
        view.set_probing_column(&problem, 0, 1.0);
        view.propagate_domains(&problem);

        for bc in view.get_trail().iter().filter(|bc| bc.reason_row >= 0) {
            let row = bc.reason_row as usize;
            let act = problem.row_activity(
                row,
                view.probing_lower_bounds(),
                view.probing_upper_bounds(),
                view.probing_flags(),
            );
            let lhs = problem.matrix().lhs()[row];
            let rhs = problem.matrix().rhs()[row];
            assert!(act.min <= rhs + 1e-6);
            assert!(act.max >= lhs - 1e-6);
        }
    }
}
