use std::time::Instant;

use log::info;

use crate::num::Num;
use crate::problem::{Problem, RowFlags};

/// Wall-clock budget shared by every component of one heuristic call. All
/// inner loops poll `expired()` at their outer loop boundary; there is no
/// cross-thread kill signal.
#[derive(Clone, Copy, Debug)]
pub struct Timer {
    start: Instant,
    limit: f64,
}

impl Timer {
    pub fn new(limit_seconds: f64) -> Timer {
        Timer {
            start: Instant::now(),
            limit: limit_seconds,
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    pub fn remaining(&self) -> f64 {
        (self.limit - self.elapsed()).max(0.0)
    }

    /// Instant at which the budget runs out, for deadline-based checks.
    /// Budgets are capped so that hosts passing huge sentinels stay
    /// representable.
    pub fn deadline(&self) -> Instant {
        const MAX_BUDGET: f64 = 1.0e9;
        self.start + std::time::Duration::from_secs_f64(self.limit.clamp(0.0, MAX_BUDGET))
    }
}

pub fn check_domains(problem: &Problem) {
    let num = Num::default();
    let mut n_continuous = 0;
    let mut n_integer = 0;
    let mut n_binary = 0;
    let mut integer_domain_size = 0.0;
    let mut integer_unbounded = 0;
    for col in 0..problem.n_cols() {
        if !problem.is_integral(col) {
            n_continuous += 1;
        } else if problem.is_binary(col) {
            n_binary += 1;
        } else {
            let flags = problem.col_flags()[col];
            if flags.test(crate::problem::ColFlags::LB_INF)
                || flags.test(crate::problem::ColFlags::UB_INF)
            {
                n_integer += 1;
                integer_unbounded += 1;
            } else {
                n_integer += 1;
                integer_domain_size += num.feas_floor(problem.upper_bounds()[col])
                    - num.feas_ceil(problem.lower_bounds()[col]);
            }
        }
    }
    info!(
        "  cont:{} int:{} bin:{} domain_size:{} unbounded:{}",
        n_continuous, n_integer, n_binary, integer_domain_size, integer_unbounded
    );
}

pub fn check_constraints(problem: &Problem) {
    let mut n_clause = 0;
    let mut n_atmost1 = 0;
    let mut n_card = 0;
    let mut n_pb = 0;
    let mut n_general = 0;
    for row in 0..problem.n_rows() {
        if constraint_is_clause(problem, row) {
            n_clause += 1;
        } else if constraint_is_atmost1(problem, row) {
            n_atmost1 += 1;
        } else if constraint_is_card(problem, row) {
            n_card += 1;
        } else if constraint_is_pb(problem, row) {
            n_pb += 1;
        } else {
            n_general += 1;
        }
    }
    info!(
        "  clauses:{} atm1:{} card:{} pb:{} general:{}",
        n_clause, n_atmost1, n_card, n_pb, n_general
    );
}

fn all_binary_unit(problem: &Problem, row: usize) -> bool {
    let (cols, vals) = problem.matrix().row_entries(row);
    cols.iter()
        .zip(vals)
        .all(|(&col, &val)| problem.is_binary(col) && val.abs() == 1.0)
}

fn all_binary(problem: &Problem, row: usize) -> bool {
    let (cols, _) = problem.matrix().row_entries(row);
    cols.iter().all(|&col| problem.is_binary(col))
}

/// `x + y + ... >= 1` modulo negations.
fn constraint_is_clause(problem: &Problem, row: usize) -> bool {
    if problem.matrix().row_flags()[row].test(RowFlags::LHS_INF)
        || problem.matrix().row_flags()[row].test(RowFlags::EQUATION)
        || !all_binary_unit(problem, row)
    {
        return false;
    }
    let (_, vals) = problem.matrix().row_entries(row);
    let mut lhs = problem.matrix().lhs()[row];
    for &val in vals {
        if val == -1.0 {
            lhs += 1.0;
        }
    }
    lhs == 1.0
}

/// `x1 + x2 + ... <= 1` modulo negations.
fn constraint_is_atmost1(problem: &Problem, row: usize) -> bool {
    if problem.matrix().row_flags()[row].test(RowFlags::RHS_INF)
        || problem.matrix().row_flags()[row].test(RowFlags::EQUATION)
        || !all_binary_unit(problem, row)
    {
        return false;
    }
    let (_, vals) = problem.matrix().row_entries(row);
    let mut rhs = problem.matrix().rhs()[row];
    for &val in vals {
        if val == -1.0 {
            rhs += 1.0;
        }
    }
    rhs == 1.0
}

/// Cardinality constraint: unit binary row with a degree above one.
fn constraint_is_card(problem: &Problem, row: usize) -> bool {
    if !all_binary_unit(problem, row) {
        return false;
    }
    let flags = problem.matrix().row_flags()[row];
    if !flags.test(RowFlags::LHS_INF) {
        let (_, vals) = problem.matrix().row_entries(row);
        let mut lhs = problem.matrix().lhs()[row];
        for &val in vals {
            if val == -1.0 {
                lhs += 1.0;
            }
        }
        return lhs >= 1.0;
    }
    false
}

/// General pseudo-Boolean row: binary variables, arbitrary coefficients.
fn constraint_is_pb(problem: &Problem, row: usize) -> bool {
    all_binary(problem, row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;

    #[test]
    fn timer_with_zero_budget_is_expired() {
        let timer = Timer::new(0.0);
        assert!(timer.expired());
        assert_eq!(timer.remaining(), 0.0);
    }

    #[test]
    fn classifies_rows() {
        let mut builder = ProblemBuilder::new("classes");
        for _ in 0..3 {
            builder.add_col(Some(0.0), Some(1.0), true, 0.0);
        }
        let clause = builder.add_row(Some(1.0), None, &[(0, 1.0), (1, 1.0)]);
        let atmost = builder.add_row(None, Some(1.0), &[(0, 1.0), (2, 1.0)]);
        let card = builder.add_row(Some(2.0), None, &[(0, 1.0), (1, 1.0), (2, 1.0)]);
        let problem = builder.build();

        assert!(constraint_is_clause(&problem, clause));
        assert!(!constraint_is_clause(&problem, atmost));
        assert!(constraint_is_atmost1(&problem, atmost));
        assert!(constraint_is_card(&problem, card));
    }
}
