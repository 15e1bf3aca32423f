//! The volume algorithm: a subgradient-style Lagrangian iteration that
//! maintains a convex combination of primal subproblem solutions.
//!
//! Expects minimisation, rows in `=` or `>=` form (see
//! [`reformulate_for_volume`]) and duals that are free on equations and
//! non-negative on inequalities; the projection enforcing the latter runs
//! every round.

use log::{debug, info};

use crate::linalg;
use crate::num::{Num, StableSum};
use crate::params::AlgorithmParameter;
use crate::problem::{ColFlags, ConstraintMatrix, Problem, ProblemBuilder, RowFlags};
use crate::util::Timer;

pub struct VolumeAlgorithm {
    num: Num,
    timer: Timer,
    parameter: AlgorithmParameter,
    alpha: f64,
    alpha_max: f64,
    f: f64,
    rounds: u32,
}

impl VolumeAlgorithm {
    pub fn new(num: Num, timer: Timer, parameter: AlgorithmParameter) -> VolumeAlgorithm {
        let alpha = parameter.alpha;
        let alpha_max = parameter.alpha_max;
        let f = parameter.f;
        VolumeAlgorithm {
            num,
            timer,
            parameter,
            alpha,
            alpha_max,
            f,
            rounds: 0,
        }
    }

    /// Rounds the last call performed; the seeding subproblem solve counts
    /// as the first round, so an exhausted time budget leaves this at one.
    pub fn rounds_performed(&self) -> u32 {
        self.rounds
    }

    /// Runs the primal-dual iteration and returns the averaged primal
    /// estimate x̄.
    #[allow(clippy::too_many_arguments)]
    pub fn volume_algorithm(
        &mut self,
        c: &[f64],
        matrix: &ConstraintMatrix,
        b: &[f64],
        lower: &[f64],
        upper: &[f64],
        col_flags: &[ColFlags],
        pi: &[f64],
        num_int_vars: usize,
        box_upper_bound: f64,
    ) -> Vec<f64> {
        let n_rows = matrix.n_rows();
        let n_cols = matrix.n_cols();
        self.rounds = 1;

        let mut x_t = vec![0.0; n_cols];
        let mut pi_t = pi.to_vec();
        project_duals(matrix, &mut pi_t);
        let mut pi_bar = pi.to_vec();

        // solve (6) at the initial duals to seed x̄ and z̄
        let mut z_bar =
            match self.solve_subproblem(c, matrix, b, lower, upper, col_flags, pi, &mut x_t) {
                Some(z) => z,
                None => return x_t,
            };
        let mut x_bar = x_t.clone();
        if n_rows == 0 {
            return x_bar;
        }
        let mut z_bar_old = z_bar;
        let upper_bound_reset_val = if self.num.is_ge(box_upper_bound, 1.0) {
            1.0
        } else {
            box_upper_bound
        };
        let mut upper_bound = 0.0;
        let mut finite_upper_bound = false;

        let mut x_bar_last_iter = x_bar.clone();
        let mut fixed_int_vars_count = vec![0u32; n_cols];
        self.init_fixed_int_count(&x_bar, col_flags, &mut fixed_int_vars_count);

        let mut counter: u32 = 1;
        let mut weak_improvement_iter_counter = 0;
        let mut non_improvement_iter_counter = 0;

        let mut v_t = vec![0.0; n_rows];
        linalg::residual(matrix, &x_bar, b, &mut v_t);
        let mut viol_t = vec![0.0; n_rows];
        self.calc_violations(matrix, &pi_bar, &v_t, &mut viol_t);
        let mut residual_t = vec![0.0; n_rows];

        while self.keep_running(
            &viol_t,
            n_rows,
            c,
            &x_bar,
            z_bar,
            num_int_vars,
            &fixed_int_vars_count,
            counter - 1,
        ) {
            debug!("round of volume algorithm: {}", counter);

            // step 1: π_t = project(π̄ + s·v) with s from the bound gap
            self.update_upper_bound(
                z_bar,
                upper_bound_reset_val,
                &mut upper_bound,
                &mut finite_upper_bound,
            );
            let norm = linalg::l2_norm(&v_t);
            if self.num.is_zero(norm) {
                break;
            }
            let step_size = self.f * (upper_bound - z_bar) / norm.powi(2);
            debug!("   step size: {}", step_size);
            linalg::add_scaled(&pi_bar, step_size, &v_t, &mut pi_t);
            project_duals(matrix, &mut pi_t);

            let z_t = match self
                .solve_subproblem(c, matrix, b, lower, upper, col_flags, &pi_t, &mut x_t)
            {
                Some(z) => z,
                None => break,
            };

            linalg::residual(matrix, &x_t, b, &mut residual_t);
            self.calc_alpha(&residual_t, &v_t);

            x_bar_last_iter.copy_from_slice(&x_bar);
            // x̄ ← αx_t + (1 − α)x̄
            for i in 0..n_cols {
                x_bar[i] = self.alpha * x_t[i] + (1.0 - self.alpha) * x_bar[i];
            }

            // step 2: accept the new duals only on improvement
            let improvement_indicator = self.num.is_gt(z_t, z_bar);
            if improvement_indicator {
                z_bar = z_t;
                pi_bar.copy_from_slice(&pi_t);
            }

            self.update_fixed_int_count(
                &x_bar,
                &x_bar_last_iter,
                col_flags,
                &mut fixed_int_vars_count,
            );

            linalg::residual(matrix, &x_bar, b, &mut v_t);
            self.calc_violations(matrix, &pi_bar, &v_t, &mut viol_t);

            self.update_f(
                improvement_indicator,
                &v_t,
                &residual_t,
                &mut weak_improvement_iter_counter,
                &mut non_improvement_iter_counter,
            );

            if counter % 100 == 0 {
                self.update_alpha_max(z_bar, z_bar_old);
                z_bar_old = z_bar;
            }

            counter += 1;
            self.rounds = counter;
        }
        info!("volume algorithm performed {} rounds", counter);
        x_bar
    }

    #[allow(clippy::too_many_arguments)]
    fn keep_running(
        &self,
        viol: &[f64],
        n_rows: usize,
        c: &[f64],
        x_bar: &[f64],
        z_bar: f64,
        num_int_vars: usize,
        fixed_int_vars_count: &[u32],
        num_iterations: u32,
    ) -> bool {
        let primal_feas_term = self.num.is_lt(
            linalg::l1_norm(viol),
            n_rows as f64 * self.parameter.con_abstol,
        );

        let obj = linalg::dot(c, x_bar);
        let duality_gap_term = if self.num.is_zero(z_bar) {
            self.num.is_lt(obj.abs(), self.parameter.obj_abstol)
        } else {
            self.num
                .is_lt((obj - z_bar).abs(), z_bar.abs() * self.parameter.obj_reltol)
        };

        // fraction of integer variables stuck at an integer value
        let num_iters_check = self.parameter.num_iters_fixed_int_vars_check;
        let stuck = fixed_int_vars_count
            .iter()
            .filter(|&&count| count > num_iters_check)
            .count();
        let fixed_int_var_term = num_int_vars > 0
            && stuck as f64 >= num_int_vars as f64 * self.parameter.fixed_int_var_threshold;

        debug!("   cons: {}", linalg::l1_norm(viol) / n_rows as f64);
        debug!("   zbar: {}", z_bar);

        let time_limit_term = self.timer.expired();
        let iter_limit_term = num_iterations >= self.parameter.max_iterations;

        !((primal_feas_term && duality_gap_term)
            || fixed_int_var_term
            || time_limit_term
            || iter_limit_term)
    }

    /// Solves the box-relaxed Lagrangian subproblem by choosing the bound
    /// indicated by the sign of each reduced cost. `None` signals an
    /// unbounded direction; the outer loop terminates on it.
    #[allow(clippy::too_many_arguments)]
    fn solve_subproblem(
        &self,
        c: &[f64],
        matrix: &ConstraintMatrix,
        b: &[f64],
        lower: &[f64],
        upper: &[f64],
        col_flags: &[ColFlags],
        pi: &[f64],
        solution: &mut [f64],
    ) -> Option<f64> {
        let mut updated_objective = vec![0.0; c.len()];
        linalg::reduced_costs(matrix, pi, c, &mut updated_objective);

        let mut obj_value = StableSum::new();
        obj_value.add(linalg::dot(b, pi));

        for i in 0..updated_objective.len() {
            let lb_inf = col_flags[i].test(ColFlags::LB_INF);
            let ub_inf = col_flags[i].test(ColFlags::UB_INF);
            if self.num.is_zero(updated_objective[i]) {
                // any in-box value is optimal for a zero reduced cost
                solution[i] = if !lb_inf {
                    lower[i]
                } else if !ub_inf {
                    upper[i]
                } else {
                    0.0
                };
                continue;
            } else if self.num.is_gt(updated_objective[i], 0.0) {
                if lb_inf {
                    return None;
                }
                solution[i] = lower[i];
            } else {
                if ub_inf {
                    return None;
                }
                solution[i] = upper[i];
            }
            obj_value.add(updated_objective[i] * solution[i]);
        }

        debug!("   opt_val: {}", obj_value.get());
        Some(obj_value.get())
    }

    fn init_fixed_int_count(
        &self,
        x_bar: &[f64],
        col_flags: &[ColFlags],
        fixed_int_vars_count: &mut [u32],
    ) {
        for i in 0..x_bar.len() {
            if col_flags[i].test(ColFlags::INTEGRAL) && self.num.is_integral(x_bar[i]) {
                fixed_int_vars_count[i] = 1;
            }
        }
    }

    fn update_fixed_int_count(
        &self,
        x_bar: &[f64],
        x_bar_last_iter: &[f64],
        col_flags: &[ColFlags],
        fixed_int_vars_count: &mut [u32],
    ) {
        for i in 0..x_bar.len() {
            if col_flags[i].test(ColFlags::INTEGRAL)
                && self.num.is_integral(x_bar[i])
                && self.num.is_eq(x_bar[i], x_bar_last_iter[i])
            {
                fixed_int_vars_count[i] += 1;
            } else {
                fixed_int_vars_count[i] = 0;
            }
        }
    }

    /// Zeroes residual entries of satisfied inequalities whose dual is at
    /// its sign bound; only genuine violations count toward stopping.
    fn calc_violations(
        &self,
        matrix: &ConstraintMatrix,
        pi: &[f64],
        residual: &[f64],
        viol_residual: &mut [f64],
    ) {
        viol_residual.copy_from_slice(residual);
        for i in 0..matrix.n_rows() {
            if matrix.row_flags()[i].test(RowFlags::RHS_INF)
                && self.num.is_lt(residual[i], 0.0)
                && self.num.is_zero(pi[i])
            {
                viol_residual[i] = 0.0;
            }
        }
    }

    fn update_upper_bound(
        &self,
        z_bar: f64,
        upper_bound_reset_val: f64,
        upper_bound: &mut f64,
        finite_upper_bound: &mut bool,
    ) {
        if *finite_upper_bound {
            if self.num.is_ge(z_bar, *upper_bound - upper_bound.abs() * 0.05) {
                *upper_bound = if self.num.is_zero(z_bar) {
                    upper_bound_reset_val
                } else {
                    (*upper_bound + upper_bound.abs() * 0.03).max(z_bar + z_bar.abs() * 0.06)
                };
                debug!("   updated best bound: {}", upper_bound);
            }
        } else {
            *upper_bound = if self.num.is_zero(z_bar) {
                upper_bound_reset_val
            } else {
                z_bar + z_bar.abs() * 0.06
            };
            *finite_upper_bound = true;
            debug!("   updated best bound: {}", upper_bound);
        }
    }

    /// Closed-form minimiser of ‖αr_t + (1 − α)v‖², clamped into
    /// [α_max/10, α_max].
    fn calc_alpha(&mut self, residual_t: &[f64], residual_bar: &[f64]) {
        let t_t_prod = linalg::dot(residual_t, residual_t);
        let t_bar_prod = linalg::dot(residual_t, residual_bar);
        let bar_bar_prod = linalg::dot(residual_bar, residual_bar);

        let mut alpha_opt = self.alpha_max;
        let denominator = t_t_prod + bar_bar_prod - 2.0 * t_bar_prod;
        if self.num.is_gt(denominator, 0.0) {
            alpha_opt = (bar_bar_prod - t_bar_prod) / denominator;
        }

        self.alpha = if self.num.is_lt(alpha_opt, self.alpha_max / 10.0) {
            self.alpha_max / 10.0
        } else if self.num.is_gt(alpha_opt, self.alpha_max) {
            self.alpha_max
        } else {
            alpha_opt
        };

        debug!(
            "   alpha_opt: {}, alpha_max: {}, alpha: {}",
            alpha_opt, self.alpha_max, self.alpha
        );
    }

    /// Three-colour step multiplier schedule: green rounds increase f
    /// strongly, repeated yellow rounds increase it weakly, repeated red
    /// rounds decrease it.
    fn update_f(
        &mut self,
        improvement_indicator: bool,
        v_t: &[f64],
        residual_t: &[f64],
        weak_improvement_iter_counter: &mut u32,
        non_improvement_iter_counter: &mut u32,
    ) {
        let mut change_f = 0;

        if improvement_indicator {
            if self.num.is_ge(linalg::dot(v_t, residual_t), 0.0) {
                change_f = 2;
            } else {
                *weak_improvement_iter_counter += 1;
                if *weak_improvement_iter_counter >= self.parameter.weak_improvement_iter_limit {
                    *weak_improvement_iter_counter = 0;
                    change_f = 1;
                }
            }
        } else {
            *non_improvement_iter_counter += 1;
            if *non_improvement_iter_counter >= self.parameter.non_improvement_iter_limit {
                *non_improvement_iter_counter = 0;
                change_f = -1;
            }
        }

        if change_f == 2 {
            self.f = (self.parameter.f_strong_incr_factor * self.f).min(self.parameter.f_max);
            debug!("   increased f: {}", self.f);
        } else if change_f == 1 {
            self.f = (self.parameter.f_weak_incr_factor * self.f).min(self.parameter.f_max);
            debug!("   increased f: {}", self.f);
        } else if change_f <= -1
            && self
                .num
                .is_ge(self.parameter.f_decr_factor * self.f, self.parameter.f_min)
        {
            self.f = self.parameter.f_decr_factor * self.f;
            debug!("   decreased f: {}", self.f);
        }
    }

    fn update_alpha_max(&mut self, z_bar: f64, z_bar_old: f64) {
        if self.num.is_lt(z_bar, z_bar_old + 0.01 * z_bar_old.abs())
            && self.num.is_ge(self.alpha_max / 2.0, 1e-4)
        {
            self.alpha_max /= 2.0;
        }
    }
}

/// For every `>=` row, clamps the dual to be non-negative; equation duals
/// stay free.
pub fn project_duals(matrix: &ConstraintMatrix, pi: &mut [f64]) {
    for i in 0..matrix.n_rows() {
        if matrix.row_flags()[i].test(RowFlags::RHS_INF) {
            pi[i] = pi[i].max(0.0);
        }
    }
}

/// Rewrites the problem into the `=` / `>=` form the volume algorithm
/// expects: `<=` rows are negated, ranged rows are split in two, and rows
/// whose coefficient magnitudes spread beyond
/// `vol.threshold_hard_constraints` are dropped entirely.
pub fn reformulate_for_volume(problem: &Problem, num: Num, hard_threshold: f64) -> Problem {
    let mut builder = ProblemBuilder::new(problem.name());
    builder.set_obj_offset(problem.obj_offset());
    for col in 0..problem.n_cols() {
        let flags = problem.col_flags()[col];
        builder.add_col(
            (!flags.test(ColFlags::LB_INF)).then(|| problem.lower_bounds()[col]),
            (!flags.test(ColFlags::UB_INF)).then(|| problem.upper_bounds()[col]),
            flags.test(ColFlags::INTEGRAL),
            problem.objective()[col],
        );
    }

    let mut dropped = 0;
    for row in 0..problem.n_rows() {
        let flags = problem.matrix().row_flags()[row];
        if flags.test(RowFlags::REDUNDANT) {
            continue;
        }
        let (cols, vals) = problem.matrix().row_entries(row);
        if cols.is_empty() {
            continue;
        }

        let max_coeff = vals.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
        let min_coeff = vals.iter().fold(f64::INFINITY, |acc, v| acc.min(v.abs()));
        if num.is_gt(max_coeff / min_coeff, hard_threshold) {
            dropped += 1;
            continue;
        }

        let entries: Vec<(usize, f64)> = cols.iter().copied().zip(vals.iter().copied()).collect();
        let negated: Vec<(usize, f64)> = entries.iter().map(|&(c, v)| (c, -v)).collect();
        let lhs = problem.matrix().lhs()[row];
        let rhs = problem.matrix().rhs()[row];
        let lhs_inf = flags.test(RowFlags::LHS_INF);
        let rhs_inf = flags.test(RowFlags::RHS_INF);

        if flags.test(RowFlags::EQUATION) {
            builder.add_row(Some(lhs), Some(rhs), &entries);
        } else if lhs_inf && !rhs_inf {
            // a·x <= rhs becomes -a·x >= -rhs
            builder.add_row(Some(-rhs), None, &negated);
        } else if !lhs_inf && rhs_inf {
            builder.add_row(Some(lhs), None, &entries);
        } else {
            // ranged row: one >= per side
            builder.add_row(Some(-rhs), None, &negated);
            builder.add_row(Some(lhs), None, &entries);
        }
    }
    if dropped > 0 {
        info!("volume reformulation dropped {} hard rows", dropped);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;

    /// min x1 + x2 with x1 + 2 x2 <= 2, x2 <= 3, x1 in [-1, 1], x2 in [0, 1].
    fn warm_start_problem() -> Problem {
        let mut builder = ProblemBuilder::new("warm-start");
        builder.add_col(Some(-1.0), Some(1.0), true, 1.0);
        builder.add_col(Some(0.0), Some(1.0), true, 1.0);
        builder.add_row(None, Some(2.0), &[(0, 1.0), (1, 2.0)]);
        builder.add_row(None, Some(3.0), &[(1, 1.0)]);
        builder.build()
    }

    #[test]
    fn reformulation_negates_lte_rows_and_splits_ranges() {
        let mut builder = ProblemBuilder::new("reform");
        builder.add_col(Some(0.0), Some(1.0), false, 1.0);
        builder.add_row(None, Some(2.0), &[(0, 1.0)]);
        builder.add_row(Some(1.0), Some(3.0), &[(0, 1.0)]);
        builder.add_row(Some(2.0), Some(2.0), &[(0, 1.0)]);
        let problem = builder.build();

        let reformulated = reformulate_for_volume(&problem, Num::default(), 10.0);
        // one negated row, two from the range, one equation
        assert_eq!(reformulated.n_rows(), 4);
        let matrix = reformulated.matrix();
        assert_eq!(matrix.row_entries(0).1, &[-1.0]);
        assert_eq!(matrix.lhs()[0], -2.0);
        assert!(matrix.row_flags()[0].test(RowFlags::RHS_INF));
        assert!(matrix.row_flags()[3].test(RowFlags::EQUATION));
    }

    #[test]
    fn reformulation_drops_hard_rows() {
        let mut builder = ProblemBuilder::new("hard");
        builder.add_col(Some(0.0), Some(1.0), false, 1.0);
        builder.add_col(Some(0.0), Some(1.0), false, 1.0);
        builder.add_row(Some(1.0), None, &[(0, 1.0), (1, 100.0)]);
        builder.add_row(Some(1.0), None, &[(0, 1.0), (1, 1.0)]);
        let problem = builder.build();

        let reformulated = reformulate_for_volume(&problem, Num::default(), 10.0);
        assert_eq!(reformulated.n_rows(), 1);
    }

    #[test]
    fn warm_start_converges_to_the_box_optimum() {
        let problem = warm_start_problem();
        let num = Num::default();
        let mut parameter = AlgorithmParameter::default();
        parameter.threshold_hard_constraints = 10.0;
        let reformulated = reformulate_for_volume(&problem, num, 10.0);
        let b = reformulated.matrix().lhs().to_vec();

        let mut algorithm = VolumeAlgorithm::new(num, Timer::new(10.0), parameter);
        let x_bar = algorithm.volume_algorithm(
            reformulated.objective(),
            reformulated.matrix(),
            &b,
            reformulated.lower_bounds(),
            reformulated.upper_bounds(),
            reformulated.col_flags(),
            &[0.0, 0.0],
            2,
            3.0,
        );

        // both constraints hold with slack at the optimum, so the average
        // stays at the box minimiser (-1, 0)
        assert!((x_bar[0] - -1.0).abs() < 0.02);
        assert!(x_bar[1].abs() < 0.02);
        let mut viol = vec![0.0; reformulated.n_rows()];
        linalg::residual(reformulated.matrix(), &x_bar, &b, &mut viol);
        let mut satisfied = viol.clone();
        for (i, v) in satisfied.iter_mut().enumerate() {
            if reformulated.matrix().row_flags()[i].test(RowFlags::RHS_INF) && *v < 0.0 {
                *v = 0.0;
            }
        }
        assert!(linalg::l1_norm(&satisfied) / reformulated.n_rows() as f64 <= 0.02);
    }

    #[test]
    fn duals_stay_projected_on_inequalities() {
        let problem = warm_start_problem();
        let num = Num::default();
        let reformulated = reformulate_for_volume(&problem, num, 10.0);
        let mut pi = vec![-0.5, 0.25];
        project_duals(reformulated.matrix(), &mut pi);
        assert_eq!(pi, vec![0.0, 0.25]);
    }

    #[test]
    fn unbounded_subproblem_terminates_early() {
        let mut builder = ProblemBuilder::new("unbounded");
        builder.add_col(None, Some(1.0), false, 1.0);
        builder.add_row(Some(0.0), None, &[(0, 1.0)]);
        let problem = builder.build();
        let num = Num::default();
        let b = problem.matrix().lhs().to_vec();

        let mut algorithm =
            VolumeAlgorithm::new(num, Timer::new(10.0), AlgorithmParameter::default());
        // positive reduced cost with an infinite lower bound: the
        // subproblem reports the unbounded direction and the call returns
        let x_bar = algorithm.volume_algorithm(
            problem.objective(),
            problem.matrix(),
            &b,
            problem.lower_bounds(),
            problem.upper_bounds(),
            problem.col_flags(),
            &[0.0],
            0,
            1.0,
        );
        assert_eq!(x_bar.len(), 1);
    }
}
