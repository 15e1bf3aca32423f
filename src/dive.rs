//! Depth-first fix-and-propagate diving with single-level backtracking.
//!
//! The engine repeatedly asks a rounding strategy for a fixing, applies it to
//! the probing view and propagates. When a dive runs into a conflict and
//! backtracking is enabled, the last decision is flipped by one integer unit
//! toward the reference point and the dive continues; flipping more than one
//! level deep is out of scope to bound the cost per call.

use log::debug;
use rand::Rng;
use rand::SeedableRng;

use crate::interval::Interval;
use crate::num::Num;
use crate::probing::ProbingView;
use crate::problem::Problem;
use crate::rounding::RoundingStrategy;

pub struct FixAndPropagate {
    num: Num,
}

/// Reference-point builders for dives that have no LP relaxation hint.
#[derive(Clone, Copy, Debug)]
pub enum StartPoint {
    Zero,
    LowerBounds,
    UpperBounds,
    Midpoint,
    Random(u64),
}

impl FixAndPropagate {
    pub fn new(num: Num) -> FixAndPropagate {
        FixAndPropagate { num }
    }

    /// Dives to a leaf guided by `strategy`. Returns `true` when the dive
    /// ended infeasibly; otherwise `result` holds an integer vector.
    #[allow(clippy::too_many_arguments)]
    pub fn fix_and_propagate(
        &self,
        problem: &Problem,
        cont_solution: &[f64],
        result: &mut [f64],
        strategy: &mut dyn RoundingStrategy,
        view: &mut ProbingView,
        successful_backtracks: &mut usize,
        perform_backtracking: bool,
        stop_at_infeasibility: bool,
        max_backtracks: usize,
    ) -> bool {
        view.reset(problem);

        // without backtracking just dive to the leaf, feasible or not
        if !perform_backtracking {
            self.propagate_to_leaf_or_infeasibility(
                problem,
                cont_solution,
                strategy,
                stop_at_infeasibility,
                view,
            );
            if stop_at_infeasibility && view.is_infeasible() {
                return true;
            }
            return self.finish_dive(problem, cont_solution, view, result);
        }

        loop {
            self.propagate_to_leaf_or_infeasibility(problem, cont_solution, strategy, true, view);

            if !view.is_infeasible() {
                return self.finish_dive(problem, cont_solution, view, result);
            }

            debug!("backtracking at depth {}", view.decision_level());
            let fixings = view.get_fixings().to_vec();
            debug_assert!(!fixings.is_empty());
            let last_fix = fixings[fixings.len() - 1];
            let backtracks_left = *successful_backtracks < max_backtracks;

            view.reset(problem);
            for fixing in &fixings[..fixings.len() - 1] {
                view.set_probing_column(problem, fixing.column(), fixing.value());
                self.perform_probing_step(problem, view);
            }
            if !backtracks_left || view.is_infeasible() || view.deadline_expired() {
                // replaying the prefix is already conflicting or the
                // backtrack budget is spent; give up on this dive
                if stop_at_infeasibility {
                    return true;
                }
                self.propagate_to_leaf_or_infeasibility(
                    problem,
                    cont_solution,
                    strategy,
                    false,
                    view,
                );
                return self.finish_dive(problem, cont_solution, view, result);
            }

            view.set_probing_column(
                problem,
                last_fix.column(),
                self.modify_value_due_to_backtrack(
                    last_fix.value(),
                    cont_solution[last_fix.column()],
                ),
            );
            let infeasible = self.perform_probing_step(problem, view);
            if infeasible {
                if stop_at_infeasibility {
                    return true;
                }
                self.propagate_to_leaf_or_infeasibility(
                    problem,
                    cont_solution,
                    strategy,
                    false,
                    view,
                );
                return self.finish_dive(problem, cont_solution, view, result);
            }
            *successful_backtracks += 1;
        }
    }

    /// Completes a dive: assigns the unfixed columns, extracts the vector
    /// and reports failure when the dive is infeasible or ran out of time
    /// before fixing everything.
    fn finish_dive(
        &self,
        problem: &Problem,
        cont_solution: &[f64],
        view: &mut ProbingView,
        result: &mut [f64],
    ) -> bool {
        self.fix_remaining_integer_solutions(problem, cont_solution, view);
        self.create_solution(result, view);
        if view.is_infeasible() {
            return true;
        }
        if view.deadline_expired() {
            return !(0..result.len()).all(|col| view.is_fixed(col));
        }
        false
    }

    /// Dives from a synthetic reference point instead of an LP hint.
    pub fn find_initial_solution(
        &self,
        problem: &Problem,
        mode: StartPoint,
        strategy: &mut dyn RoundingStrategy,
        view: &mut ProbingView,
        result: &mut [f64],
    ) -> bool {
        let x_ref = initial_reference_point(problem, self.num, mode);
        let mut backtracks = 0;
        self.fix_and_propagate(
            problem,
            &x_ref,
            result,
            strategy,
            view,
            &mut backtracks,
            true,
            false,
            1,
        )
    }

    /// Tries a single flipped value on top of a feasible solution. Returns
    /// `true` when propagation rejects the flip.
    pub fn one_opt(
        &self,
        problem: &Problem,
        feasible_solution: &[f64],
        col: usize,
        new_value: f64,
        view: &mut ProbingView,
        result: &mut [f64],
    ) -> bool {
        view.set_probing_column(problem, col, new_value);
        if self.perform_probing_step(problem, view) {
            return true;
        }
        self.fix_remaining_integer_solutions(problem, feasible_solution, view);
        self.create_solution(result, view);
        view.is_infeasible()
    }

    fn propagate_to_leaf_or_infeasibility(
        &self,
        problem: &Problem,
        cont_solution: &[f64],
        strategy: &mut dyn RoundingStrategy,
        stop_at_infeasibility: bool,
        view: &mut ProbingView,
    ) {
        loop {
            if view.deadline_expired() {
                return;
            }
            let fixing = match strategy.select_rounding_variable(cont_solution, view, problem) {
                // all integer variables are fixed
                None => return,
                Some(fixing) => fixing,
            };
            debug_assert!(view.is_within_bounds(fixing.column(), fixing.value()));
            debug!("fix var {} to {}", fixing.column(), fixing.value());

            view.set_probing_column(problem, fixing.column(), fixing.value());
            let infeasibility_detected = self.perform_probing_step(problem, view);
            if stop_at_infeasibility && infeasibility_detected {
                return;
            }
        }
    }

    fn perform_probing_step(&self, problem: &Problem, view: &mut ProbingView) -> bool {
        if view.is_infeasible() {
            return true;
        }
        view.propagate_domains(problem);
        view.is_infeasible()
    }

    /// Flips a backtracked decision one integer step toward the reference
    /// point.
    fn modify_value_due_to_backtrack(&self, value: f64, solution_value: f64) -> f64 {
        if self.num.is_ge(value, solution_value) {
            value - 1.0
        } else {
            value + 1.0
        }
    }

    fn fix_remaining_integer_solutions(
        &self,
        problem: &Problem,
        cont_solution: &[f64],
        view: &mut ProbingView,
    ) {
        if view.is_infeasible() {
            return;
        }
        for col in 0..cont_solution.len() {
            if view.deadline_expired() {
                return;
            }
            if view.is_fixed(col) {
                continue;
            }
            let domain = Interval(
                view.probing_lower_bounds()[col],
                view.probing_upper_bounds()[col],
            );
            let value = if view.is_integer_variable(col) {
                domain.clamp(self.num.round(cont_solution[col]))
            } else {
                domain.clamp(cont_solution[col])
            };
            debug!("fix remaining var {} to {}", col, value);

            view.set_probing_column(problem, col, value);
            self.perform_probing_step(problem, view);
            if view.is_infeasible() {
                return;
            }
        }
    }

    fn create_solution(&self, result: &mut [f64], view: &ProbingView) {
        let upper = view.probing_upper_bounds();
        for (col, value) in upper.iter().enumerate() {
            debug_assert!(
                view.is_infeasible()
                    || view.deadline_expired()
                    || self
                        .num
                        .is_feas_eq(*value, view.probing_lower_bounds()[col])
            );
            result[col] = *value;
        }
    }
}

/// Builds the continuous reference point used when the host supplies no
/// fractional hint.
pub fn initial_reference_point(problem: &Problem, num: Num, mode: StartPoint) -> Vec<f64> {
    let lower = problem.lower_bounds();
    let upper = problem.upper_bounds();
    let mut rng = match mode {
        StartPoint::Random(seed) => Some(rand_xoshiro::SplitMix64::seed_from_u64(seed)),
        _ => None,
    };

    (0..problem.n_cols())
        .map(|col| {
            let lb_inf = problem.col_flags()[col].test(crate::problem::ColFlags::LB_INF);
            let ub_inf = problem.col_flags()[col].test(crate::problem::ColFlags::UB_INF);
            let value = match mode {
                StartPoint::Zero => {
                    if !ub_inf && upper[col] < 0.0 {
                        upper[col]
                    } else if !lb_inf && lower[col] > 0.0 {
                        lower[col]
                    } else {
                        0.0
                    }
                }
                StartPoint::LowerBounds => {
                    if !lb_inf {
                        lower[col]
                    } else if !ub_inf {
                        upper[col]
                    } else {
                        0.0
                    }
                }
                StartPoint::UpperBounds => {
                    if !ub_inf {
                        upper[col]
                    } else if !lb_inf {
                        lower[col]
                    } else {
                        0.0
                    }
                }
                StartPoint::Midpoint => {
                    if !lb_inf && !ub_inf {
                        (lower[col] + upper[col]) / 2.0
                    } else if !lb_inf {
                        lower[col]
                    } else if !ub_inf {
                        upper[col]
                    } else {
                        0.0
                    }
                }
                StartPoint::Random(_) => {
                    let rng = rng.as_mut().unwrap();
                    if !lb_inf && !ub_inf {
                        if upper[col] > lower[col] {
                            rng.gen_range(lower[col]..=upper[col])
                        } else {
                            lower[col]
                        }
                    } else if !lb_inf {
                        lower[col]
                    } else if !ub_inf {
                        upper[col]
                    } else {
                        0.0
                    }
                }
            };
            if problem.is_integral(col) {
                num.round(value)
            } else {
                value
            }
        })
        .collect()
}
