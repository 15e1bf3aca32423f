//! The driver that orchestrates the heuristic replicas.
//!
//! Holds one probing view, rounding strategy and result buffer per replica,
//! fans the replicas out over scoped threads, collects conflict rows, applies
//! 1-opt to the surviving solutions and tracks the incumbent. The problem is
//! shared read-only while replicas run; conflict rows are merged into it only
//! between parallel phases.

use log::info;

use crate::conflict::{ConflictAnalysis, ConflictRow};
use crate::dive::{initial_reference_point, FixAndPropagate, StartPoint};
use crate::num::{Num, StableSum};
use crate::params::AlgorithmParameter;
use crate::probing::ProbingView;
use crate::problem::Problem;
use crate::rounding::{FarkasRounding, FractionalRounding, RandomRounding, RoundingStrategy};
use crate::util::Timer;
use crate::volume::{reformulate_for_volume, VolumeAlgorithm};

/// How 1-opt verifies a candidate bit flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OneOptMode {
    Off,
    /// Flip, propagate, and require every other variable to keep its value.
    FeasibilityCheck,
    /// Flip, propagate, and rebuild the remainder by fix-and-propagate.
    WithRepair,
}

impl OneOptMode {
    pub fn from_int(mode: i32) -> OneOptMode {
        match mode {
            1 => OneOptMode::FeasibilityCheck,
            2 => OneOptMode::WithRepair,
            _ => OneOptMode::Off,
        }
    }
}

/// What to hand back when every replica dived into infeasibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfeasibleCopyStrategy {
    None,
    First,
    LeastViolated,
}

impl InfeasibleCopyStrategy {
    pub fn from_int(strategy: i32) -> InfeasibleCopyStrategy {
        match strategy {
            1 => InfeasibleCopyStrategy::First,
            2 => InfeasibleCopyStrategy::LeastViolated,
            _ => InfeasibleCopyStrategy::None,
        }
    }
}

/// Per-call options of [`Heuristic::perform_fix_and_propagate`].
#[derive(Clone, Copy, Debug)]
pub struct FixAndPropagateOptions {
    pub one_opt_mode: OneOptMode,
    pub apply_conflicts: bool,
    pub conflict_flush_threshold: usize,
    pub max_backtracks: usize,
}

impl Default for FixAndPropagateOptions {
    fn default() -> Self {
        FixAndPropagateOptions {
            one_opt_mode: OneOptMode::Off,
            apply_conflicts: false,
            conflict_flush_threshold: 100,
            max_backtracks: 1,
        }
    }
}

struct ReplicaOutcome {
    infeasible: bool,
    obj: f64,
    backtracks: usize,
    conflicts: Vec<ConflictRow>,
}

pub struct Heuristic {
    num: Num,
    parameter: AlgorithmParameter,
    timer: Timer,
    problem: Problem,
    strategies: Vec<Box<dyn RoundingStrategy>>,
    int_solutions: Vec<Vec<f64>>,
    views: Vec<ProbingView>,
    obj_value: Vec<f64>,
    infeasible_arr: Vec<bool>,
    cols_sorted_by_obj: Vec<usize>,
    pending_conflicts: Vec<ConflictRow>,
    successful_backtracks: usize,
    add_cutoff: bool,
    cutoff_row: Option<usize>,
}

impl Heuristic {
    pub fn new(
        problem: Problem,
        num: Num,
        parameter: AlgorithmParameter,
        add_cutoff: bool,
    ) -> Heuristic {
        let timer = Timer::new(parameter.time_limit);
        Heuristic {
            num,
            parameter,
            timer,
            problem,
            strategies: Vec::new(),
            int_solutions: Vec::new(),
            views: Vec::new(),
            obj_value: Vec::new(),
            infeasible_arr: Vec::new(),
            cols_sorted_by_obj: Vec::new(),
            pending_conflicts: Vec::new(),
            successful_backtracks: 0,
            add_cutoff,
            cutoff_row: None,
        }
    }

    /// Allocates the replicas and precomputes the objective-sorted column
    /// permutation used by 1-opt.
    pub fn setup(&mut self) {
        let replicas = if self.parameter.threads == 1 { 1 } else { 4 };
        let num = self.num;

        self.strategies.clear();
        self.strategies
            .push(Box::new(FarkasRounding::new(num, false)));
        if replicas > 1 {
            self.strategies.push(Box::new(FarkasRounding::new(num, true)));
            self.strategies.push(Box::new(FractionalRounding::new(num)));
            self.strategies.push(Box::new(RandomRounding::new(num, 0)));
        }

        let n_cols = self.problem.n_cols();
        self.int_solutions = vec![vec![0.0; n_cols]; replicas];
        self.views.clear();
        for _ in 0..replicas {
            self.views.push(ProbingView::new(&self.problem, num));
        }
        self.infeasible_arr = vec![true; replicas];
        self.obj_value = vec![0.0; replicas];

        let objective = self.problem.objective();
        self.cols_sorted_by_obj = (0..n_cols).collect();
        self.cols_sorted_by_obj
            .sort_unstable_by(|&a, &b| objective[b].total_cmp(&objective[a]).then(b.cmp(&a)));
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn num_replicas(&self) -> usize {
        self.views.len()
    }

    pub fn successful_backtracks(&self) -> usize {
        self.successful_backtracks
    }

    pub fn all_replicas_infeasible(&self) -> bool {
        self.infeasible_arr.iter().all(|infeasible| *infeasible)
    }

    /// Restarts the wall-clock budget, e.g. from the host's remaining time.
    pub fn restart_timer(&mut self, seconds: f64) {
        self.timer = Timer::new(seconds);
    }

    /// Runs all replicas on `x_ref`, optionally 1-opt, and updates the
    /// incumbent. Returns `true` when `best_obj`/`best_sol` were improved.
    pub fn perform_fix_and_propagate(
        &mut self,
        x_ref: &[f64],
        best_obj: &mut f64,
        best_sol: &mut Vec<f64>,
        options: FixAndPropagateOptions,
    ) -> bool {
        debug_assert_eq!(x_ref.len(), self.problem.n_cols());
        if self.add_cutoff && best_sol.len() == self.problem.n_cols() {
            self.install_cutoff(*best_obj);
        }

        let deadline = self.timer.deadline();
        let num = self.num;
        let problem = &self.problem;
        let apply_conflicts = options.apply_conflicts;
        let max_backtracks = options.max_backtracks;

        let outcomes: Vec<ReplicaOutcome> = if self.views.len() == 1 {
            vec![run_replica(
                0,
                problem,
                num,
                deadline,
                x_ref,
                apply_conflicts,
                max_backtracks,
                &mut self.views[0],
                self.strategies[0].as_mut(),
                &mut self.int_solutions[0],
            )]
        } else {
            crossbeam::scope(|s| {
                let mut handles = Vec::new();
                for (id, ((view, strategy), int_solution)) in self
                    .views
                    .iter_mut()
                    .zip(self.strategies.iter_mut())
                    .zip(self.int_solutions.iter_mut())
                    .enumerate()
                {
                    handles.push(s.spawn(move |_| {
                        run_replica(
                            id,
                            problem,
                            num,
                            deadline,
                            x_ref,
                            apply_conflicts,
                            max_backtracks,
                            view,
                            strategy.as_mut(),
                            int_solution,
                        )
                    }));
                }
                handles
                    .into_iter()
                    .map(|handle| handle.join().unwrap())
                    .collect()
            })
            .unwrap()
        };

        for (i, outcome) in outcomes.into_iter().enumerate() {
            self.infeasible_arr[i] = outcome.infeasible;
            self.obj_value[i] = outcome.obj;
            self.successful_backtracks += outcome.backtracks;
            self.pending_conflicts.extend(outcome.conflicts);
        }

        if apply_conflicts && self.pending_conflicts.len() > options.conflict_flush_threshold {
            self.flush_conflicts();
        }

        if options.one_opt_mode != OneOptMode::Off {
            self.perform_one_opt(options.one_opt_mode);
        }

        self.evaluate(best_obj, best_sol)
    }

    /// Single-bit improvement pass over all feasible replica solutions.
    ///
    /// The objective-descending permutation is scanned forward over the
    /// positive coefficients (flipping ones to zero) and backward over the
    /// negative coefficients (flipping zeros to one); either direction stops
    /// at the first zero coefficient because no remaining column can improve.
    pub fn perform_one_opt(&mut self, mode: OneOptMode) {
        if mode == OneOptMode::Off {
            return;
        }
        let deadline = self.timer.deadline();
        let num = self.num;
        let problem = &self.problem;
        let perm = &self.cols_sorted_by_obj;

        if self.views.len() == 1 {
            if !self.infeasible_arr[0] {
                one_opt_scan(
                    problem,
                    num,
                    perm,
                    0,
                    mode,
                    &mut self.views[0],
                    &mut self.int_solutions[0],
                    &mut self.obj_value[0],
                );
            }
            return;
        }

        crossbeam::scope(|s| {
            for (id, ((view, solution), (obj, infeasible))) in self
                .views
                .iter_mut()
                .zip(self.int_solutions.iter_mut())
                .zip(self.obj_value.iter_mut().zip(self.infeasible_arr.iter()))
                .enumerate()
            {
                if *infeasible {
                    continue;
                }
                s.spawn(move |_| {
                    view.set_deadline(Some(deadline));
                    one_opt_scan(problem, num, perm, id, mode, view, solution, obj);
                });
            }
        })
        .unwrap();
    }

    /// Improves a caller-supplied solution in place with 1-opt on replica 0.
    /// Returns `true` when the objective strictly decreased.
    pub fn one_opt_on(&mut self, solution: &mut [f64], mode: OneOptMode, obj: &mut f64) -> bool {
        if mode == OneOptMode::Off || self.views.is_empty() {
            return false;
        }
        let before = *obj;
        let mut local = solution.to_vec();
        self.views[0].set_deadline(Some(self.timer.deadline()));
        one_opt_scan(
            &self.problem,
            self.num,
            &self.cols_sorted_by_obj,
            0,
            mode,
            &mut self.views[0],
            &mut local,
            obj,
        );
        solution.copy_from_slice(&local);
        self.num.is_lt(*obj, before)
    }

    /// Dives without a continuous hint, seeding the reference point from the
    /// domain midpoints.
    pub fn run_simple(&mut self, best_obj: &mut f64, best_sol: &mut Vec<f64>) -> bool {
        let x_ref = initial_reference_point(&self.problem, self.num, StartPoint::Midpoint);
        self.perform_fix_and_propagate(
            &x_ref,
            best_obj,
            best_sol,
            FixAndPropagateOptions::default(),
        )
    }

    /// Runs the volume algorithm on the reformulated problem and returns the
    /// averaged primal estimate, or `None` when the objective has no finite
    /// box bound.
    pub fn compute_fractional_hint(&self, pi: Option<&[f64]>) -> Option<Vec<f64>> {
        let reformulated = reformulate_for_volume(
            &self.problem,
            self.num,
            self.parameter.threshold_hard_constraints,
        );
        let box_upper_bound = self.objective_box_bound()?;
        let b = reformulated.matrix().lhs().to_vec();
        let pi0 = match pi {
            Some(pi) => pi.to_vec(),
            None => vec![0.0; reformulated.n_rows()],
        };
        if pi0.len() != reformulated.n_rows() {
            return None;
        }

        let mut parameter = self.parameter.clone();
        parameter.time_limit = self.timer.remaining();
        let mut algorithm =
            VolumeAlgorithm::new(self.num, Timer::new(parameter.time_limit), parameter);
        Some(algorithm.volume_algorithm(
            reformulated.objective(),
            reformulated.matrix(),
            &b,
            reformulated.lower_bounds(),
            reformulated.upper_bounds(),
            reformulated.col_flags(),
            &pi0,
            reformulated.num_integral_cols(),
            box_upper_bound,
        ))
    }

    /// The least-violated replica result for hosts that want a vector even
    /// after an all-infeasible round.
    pub fn infeasible_candidate(&self, strategy: InfeasibleCopyStrategy) -> Option<&[f64]> {
        match strategy {
            InfeasibleCopyStrategy::None => None,
            InfeasibleCopyStrategy::First => self.int_solutions.first().map(|s| s.as_slice()),
            InfeasibleCopyStrategy::LeastViolated => (0..self.int_solutions.len())
                .min_by(|&a, &b| {
                    self.violation_of(&self.int_solutions[a])
                        .total_cmp(&self.violation_of(&self.int_solutions[b]))
                })
                .map(|i| self.int_solutions[i].as_slice()),
        }
    }

    fn violation_of(&self, solution: &[f64]) -> f64 {
        let matrix = self.problem.matrix();
        let mut total = 0.0;
        for row in 0..matrix.n_rows() {
            let (cols, vals) = matrix.row_entries(row);
            let activity: f64 = cols
                .iter()
                .zip(vals)
                .map(|(&col, &val)| val * solution[col])
                .sum();
            let flags = matrix.row_flags()[row];
            if !flags.test(crate::problem::RowFlags::LHS_INF) {
                total += (matrix.lhs()[row] - activity).max(0.0);
            }
            if !flags.test(crate::problem::RowFlags::RHS_INF) {
                total += (activity - matrix.rhs()[row]).max(0.0);
            }
        }
        total
    }

    /// Picks the best feasible replica: strictly improving on the incumbent,
    /// or any feasible one while no incumbent exists. Replicas are visited in
    /// id order so the reduction is deterministic.
    fn evaluate(&mut self, best_obj: &mut f64, best_sol: &mut Vec<f64>) -> bool {
        let feasible = self.infeasible_arr.iter().any(|infeasible| !infeasible);
        if !feasible {
            info!("fix-and-propagate did not find a feasible solution");
            return false;
        }

        let had_incumbent = !best_sol.is_empty();
        let mut best_index = None;
        for i in 0..self.obj_value.len() {
            if self.infeasible_arr[i] {
                continue;
            }
            if self.num.is_lt(self.obj_value[i], *best_obj)
                || (!had_incumbent && best_index.is_none())
            {
                best_index = Some(i);
                *best_obj = self.obj_value[i];
            }
        }

        match best_index {
            None => {
                info!("fix-and-propagate did not improve the current solution");
                false
            }
            Some(i) => {
                if had_incumbent {
                    info!("fix-and-propagate found a new solution: {}", best_obj);
                } else {
                    info!("fix-and-propagate found an initial solution: {}", best_obj);
                }
                best_sol.clear();
                best_sol.extend_from_slice(&self.int_solutions[i]);
                true
            }
        }
    }

    fn flush_conflicts(&mut self) {
        let conflicts = std::mem::take(&mut self.pending_conflicts);
        let count = conflicts.len();
        for conflict in conflicts {
            self.problem.matrix_mut().add_row(
                conflict.cols(),
                conflict.vals(),
                Some(conflict.lhs()),
                None,
            );
        }
        info!("flushed {} conflict rows into the problem", count);
    }

    /// Installs or refreshes the objective cutoff row `c·x <= best - tol` so
    /// propagation prunes non-improving dives.
    fn install_cutoff(&mut self, best_obj: f64) {
        let rhs = best_obj - self.num.feastol();
        match self.cutoff_row {
            Some(row) => self.problem.matrix_mut().set_row_rhs(row, rhs),
            None => {
                let entries: Vec<(usize, f64)> = self
                    .problem
                    .objective()
                    .iter()
                    .enumerate()
                    .filter(|(_, &coeff)| !self.num.is_zero(coeff))
                    .map(|(col, &coeff)| (col, coeff))
                    .collect();
                if entries.is_empty() {
                    return;
                }
                let cols: Vec<usize> = entries.iter().map(|e| e.0).collect();
                let vals: Vec<f64> = entries.iter().map(|e| e.1).collect();
                self.problem
                    .matrix_mut()
                    .add_row(&cols, &vals, None, Some(rhs));
                self.cutoff_row = Some(self.problem.n_rows() - 1);
                info!("installed objective cutoff at {}", rhs);
            }
        }
    }

    fn objective_box_bound(&self) -> Option<f64> {
        let mut bound = StableSum::new();
        for col in 0..self.problem.n_cols() {
            let coeff = self.problem.objective()[col];
            if self.num.is_zero(coeff) {
                continue;
            }
            let flags = self.problem.col_flags()[col];
            if coeff < 0.0 {
                if flags.test(crate::problem::ColFlags::LB_INF) {
                    info!("no objective box bound: column {} is unbounded", col);
                    return None;
                }
                bound.add(coeff * self.problem.lower_bounds()[col]);
            } else {
                if flags.test(crate::problem::ColFlags::UB_INF) {
                    info!("no objective box bound: column {} is unbounded", col);
                    return None;
                }
                bound.add(coeff * self.problem.upper_bounds()[col]);
            }
        }
        Some(bound.get())
    }
}

/// One dive of one replica, run inline or on a scoped thread.
#[allow(clippy::too_many_arguments)]
fn run_replica(
    id: usize,
    problem: &Problem,
    num: Num,
    deadline: std::time::Instant,
    x_ref: &[f64],
    apply_conflicts: bool,
    max_backtracks: usize,
    view: &mut ProbingView,
    strategy: &mut dyn RoundingStrategy,
    int_solution: &mut [f64],
) -> ReplicaOutcome {
    view.set_deadline(Some(deadline));
    let engine = FixAndPropagate::new(num);
    let mut backtracks = 0;
    let infeasible = engine.fix_and_propagate(
        problem,
        x_ref,
        int_solution,
        strategy,
        view,
        &mut backtracks,
        max_backtracks > 0,
        false,
        max_backtracks,
    );

    let mut conflicts = Vec::new();
    let obj = if infeasible {
        if apply_conflicts {
            ConflictAnalysis::new(num).perform_conflict_analysis(
                problem,
                view.get_trail(),
                view.conflict_row(),
                &mut conflicts,
            );
        }
        0.0
    } else {
        let mut sum = StableSum::new();
        for (value, coeff) in int_solution.iter().zip(problem.objective()) {
            sum.add(value * coeff);
        }
        info!("id:{} diving found obj value {}", id, sum.get());
        sum.get()
    };
    ReplicaOutcome {
        infeasible,
        obj,
        backtracks,
        conflicts,
    }
}

/// The per-replica 1-opt pass. Only binary integer columns are flipped; the
/// trial direction follows the sign of the objective coefficient.
#[allow(clippy::too_many_arguments)]
fn one_opt_scan(
    problem: &Problem,
    num: Num,
    perm: &[usize],
    id: usize,
    mode: OneOptMode,
    view: &mut ProbingView,
    solution: &mut Vec<f64>,
    obj: &mut f64,
) {
    let engine = FixAndPropagate::new(num);
    let mut result = solution.clone();

    let mut try_flip = |col: usize,
                        target: f64,
                        view: &mut ProbingView,
                        solution: &mut Vec<f64>,
                        obj: &mut f64,
                        result: &mut Vec<f64>| {
        view.reset(problem);
        if view.deadline_expired() {
            return;
        }
        let rejected = match mode {
            OneOptMode::Off => return,
            OneOptMode::FeasibilityCheck => {
                view.set_probing_column(problem, col, target);
                view.propagate_domains(problem);
                let ok = !view.is_infeasible()
                    && (0..solution.len())
                        .all(|j| j == col || view.is_within_bounds(j, solution[j]));
                if ok {
                    result.copy_from_slice(solution);
                    result[col] = target;
                }
                !ok
            }
            OneOptMode::WithRepair => {
                engine.one_opt(problem, solution, col, target, view, result)
            }
        };
        if rejected {
            info!(" {} - one-opt flipping variable {}: infeasible", id, col);
            return;
        }

        let mut sum = StableSum::new();
        for (value, coeff) in result.iter().zip(problem.objective()) {
            sum.add(value * coeff);
        }
        let value = sum.get();
        if num.is_lt(value, *obj) {
            info!(
                " {} - one-opt flipping variable {}: successful -> better obj {}",
                id, col, value
            );
            solution.copy_from_slice(result);
            *obj = value;
        } else {
            info!(
                " {} - one-opt flipping variable {}: unsuccessful -> worse obj {}",
                id, col, value
            );
        }
    };

    // positive-coefficient prefix: try setting ones to zero
    for &col in perm.iter() {
        let coeff = problem.objective()[col];
        if num.is_zero(coeff) || coeff < 0.0 {
            break;
        }
        if !problem.is_binary(col) || solution[col] < 0.5 {
            continue;
        }
        try_flip(col, 0.0, view, solution, obj, &mut result);
    }

    // negative-coefficient suffix, most negative first: zeros to one
    for &col in perm.iter().rev() {
        let coeff = problem.objective()[col];
        if num.is_zero(coeff) || coeff > 0.0 {
            break;
        }
        if !problem.is_binary(col) || solution[col] > 0.5 {
            continue;
        }
        try_flip(col, 1.0, view, solution, obj, &mut result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;

    /// min 3 x1 - 5 x2 subject to x1 + x2 >= 1 over binaries.
    fn covering_problem() -> Problem {
        let mut builder = ProblemBuilder::new("cover");
        builder.add_col(Some(0.0), Some(1.0), true, 3.0);
        builder.add_col(Some(0.0), Some(1.0), true, -5.0);
        builder.add_row(Some(1.0), None, &[(0, 1.0), (1, 1.0)]);
        builder.build()
    }

    fn single_thread_parameter() -> AlgorithmParameter {
        let mut parameter = AlgorithmParameter::default();
        parameter.threads = 1;
        parameter
    }

    #[test]
    fn fix_and_propagate_finds_and_improves_solutions() {
        let mut heuristic = Heuristic::new(
            covering_problem(),
            Num::default(),
            single_thread_parameter(),
            false,
        );
        heuristic.setup();
        assert_eq!(heuristic.num_replicas(), 1);

        let mut best_obj = f64::INFINITY;
        let mut best_sol = Vec::new();
        let found = heuristic.perform_fix_and_propagate(
            &[0.6, 0.6],
            &mut best_obj,
            &mut best_sol,
            FixAndPropagateOptions::default(),
        );
        assert!(found);
        assert_eq!(best_sol.len(), 2);
        assert!(best_sol[0] + best_sol[1] >= 1.0 - 1e-6);
    }

    #[test]
    fn one_opt_accepts_an_improving_flip() {
        let mut heuristic = Heuristic::new(
            covering_problem(),
            Num::default(),
            single_thread_parameter(),
            false,
        );
        heuristic.setup();

        // start from (1, 0) with objective 3; flipping x1 forces x2 = 1 with
        // objective -5
        let mut solution = vec![1.0, 0.0];
        let mut obj = 3.0;
        let improved = heuristic.one_opt_on(&mut solution, OneOptMode::WithRepair, &mut obj);
        assert!(improved);
        assert_eq!(solution, vec![0.0, 1.0]);
        assert_eq!(obj, -5.0);
    }

    #[test]
    fn parallel_replicas_agree_with_the_incumbent_rule() {
        let mut parameter = AlgorithmParameter::default();
        parameter.threads = 4;
        let mut heuristic =
            Heuristic::new(covering_problem(), Num::default(), parameter, false);
        heuristic.setup();
        assert_eq!(heuristic.num_replicas(), 4);

        let mut best_obj = f64::INFINITY;
        let mut best_sol = Vec::new();
        let found = heuristic.perform_fix_and_propagate(
            &[0.4, 0.9],
            &mut best_obj,
            &mut best_sol,
            FixAndPropagateOptions {
                one_opt_mode: OneOptMode::WithRepair,
                ..FixAndPropagateOptions::default()
            },
        );
        assert!(found);
        // the improving flip is available to every replica, so the
        // deterministic reduction must settle on the optimum
        assert_eq!(best_sol, vec![0.0, 1.0]);
        assert_eq!(best_obj, -5.0);

        // a second call cannot improve on the optimum
        let again = heuristic.perform_fix_and_propagate(
            &[0.4, 0.9],
            &mut best_obj,
            &mut best_sol,
            FixAndPropagateOptions::default(),
        );
        assert!(!again);
    }

    #[test]
    fn simple_heuristic_needs_no_hint() {
        let mut heuristic = Heuristic::new(
            covering_problem(),
            Num::default(),
            single_thread_parameter(),
            false,
        );
        heuristic.setup();
        let mut best_obj = f64::INFINITY;
        let mut best_sol = Vec::new();
        assert!(heuristic.run_simple(&mut best_obj, &mut best_sol));
        assert_eq!(best_sol.len(), 2);
    }

    #[test]
    fn volume_hint_matches_box_optimum() {
        let mut parameter = single_thread_parameter();
        parameter.threshold_hard_constraints = 10.0;
        let mut builder = ProblemBuilder::new("lp");
        builder.add_col(Some(-1.0), Some(1.0), true, 1.0);
        builder.add_col(Some(0.0), Some(1.0), true, 1.0);
        builder.add_row(None, Some(2.0), &[(0, 1.0), (1, 2.0)]);
        let mut heuristic = Heuristic::new(builder.build(), Num::default(), parameter, false);
        heuristic.setup();

        let hint = heuristic.compute_fractional_hint(None).unwrap();
        assert!((hint[0] - -1.0).abs() < 0.05);
        assert!(hint[1].abs() < 0.05);
    }

    #[test]
    fn unbounded_objective_yields_no_hint() {
        let mut builder = ProblemBuilder::new("no-box");
        builder.add_col(Some(0.0), None, false, 1.0);
        builder.add_row(Some(0.0), None, &[(0, 1.0)]);
        let mut heuristic = Heuristic::new(
            builder.build(),
            Num::default(),
            single_thread_parameter(),
            false,
        );
        heuristic.setup();
        assert!(heuristic.compute_fractional_hint(None).is_none());
    }
}
