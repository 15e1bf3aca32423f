//! Builds a [`Problem`] from a parsed instance.
//!
//! The objective is taken from the `N` row; its right-hand side becomes the
//! (negated) objective offset, following the MPS convention
//! `obj = c·x - rhs_N`. RANGES turn one-sided rows into two-sided ones.

use mipio::{Instance, Number, RowType, VarType};

use crate::problem::{Problem, ProblemBuilder};

pub fn problem_from_instance(instance: &Instance) -> Problem {
    let n_cols = instance.variables.len();

    let mut objective = vec![0.0; n_cols];
    let mut obj_offset = 0.0;
    if let Some((constant, cells)) = instance.objective() {
        obj_offset = -constant.map(Number::as_f64).unwrap_or(0.0);
        for cell in cells {
            objective[cell.var] += cell.coeff.as_f64();
        }
    }

    let mut builder = ProblemBuilder::new(&instance.name);
    builder.set_obj_offset(obj_offset);
    for (col, var) in instance.variables.iter().enumerate() {
        builder.add_col(
            finite_bound(var.lb.map(Number::as_f64)),
            finite_bound(var.ub.map(Number::as_f64)),
            matches!(var.var_type, VarType::Integer),
            objective[col],
        );
    }

    for constraint in &instance.constraints {
        if matches!(constraint.rowtype, RowType::None) {
            continue;
        }
        let entries: Vec<(usize, f64)> = constraint
            .cells
            .iter()
            .map(|cell| (cell.var, cell.coeff.as_f64()))
            .collect();
        let rhs = constraint.rhs.map(Number::as_f64).unwrap_or(0.0);
        let range = constraint.range.map(Number::as_f64);

        let (lhs, rhs) = match constraint.rowtype {
            RowType::None => unreachable!(),
            RowType::Equal => match range {
                // an E row with range r covers [rhs, rhs + |r|] (or below
                // for a negative range)
                Some(r) if r >= 0.0 => (Some(rhs), Some(rhs + r)),
                Some(r) => (Some(rhs + r), Some(rhs)),
                None => (Some(rhs), Some(rhs)),
            },
            RowType::Lte => match range {
                Some(r) => (Some(rhs - r.abs()), Some(rhs)),
                None => (None, Some(rhs)),
            },
            RowType::Gte => match range {
                Some(r) => (Some(rhs), Some(rhs + r.abs())),
                None => (Some(rhs), None),
            },
        };
        builder.add_row(lhs, rhs, &entries);
    }

    builder.build()
}

/// Bounds beyond [`crate::HUGE_BOUND`] in magnitude count as infinite.
fn finite_bound(bound: Option<f64>) -> Option<f64> {
    bound.filter(|value| value.abs() < crate::HUGE_BOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{ColFlags, RowFlags};

    const SMALL_MPS: &str = "NAME          convert
ROWS
 N  COST
 L  LIM1
 G  LIM2
 E  EQ1
COLUMNS
    MARKER                 'MARKER'                 'INTORG'
    X1        COST         1.0        LIM1         1.0
    X1        LIM2         1.0
    MARKER                 'MARKER'                 'INTEND'
    X2        COST         2.0        LIM1         1.0
    X2        EQ1          1.0
RHS
    RHS       LIM1         4.0        LIM2         1.0
    RHS       EQ1          2.0
RANGES
    RNG       LIM1         2.0
BOUNDS
 UP BND       X1           3.0
ENDATA
";

    #[test]
    fn converts_rows_bounds_and_objective() {
        let instance = mipio::parse(SMALL_MPS.as_bytes()).unwrap();
        let problem = problem_from_instance(&instance);

        assert_eq!(problem.n_cols(), 2);
        // the N row is not a constraint
        assert_eq!(problem.n_rows(), 3);
        assert_eq!(problem.objective(), &[1.0, 2.0]);
        assert!(problem.is_integral(0));
        assert!(!problem.is_integral(1));
        assert_eq!(problem.upper_bounds()[0], 3.0);

        // ranged L row: [rhs - range, rhs]
        let matrix = problem.matrix();
        assert_eq!(matrix.lhs()[0], 2.0);
        assert_eq!(matrix.rhs()[0], 4.0);
        // plain G row keeps an infinite rhs
        assert!(matrix.row_flags()[1].test(RowFlags::RHS_INF));
        assert_eq!(matrix.lhs()[1], 1.0);
        assert!(matrix.row_flags()[2].test(RowFlags::EQUATION));

        // default lower bound is zero, upper of X2 is infinite
        assert_eq!(problem.lower_bounds()[1], 0.0);
        assert!(problem.col_flags()[1].test(ColFlags::UB_INF));
    }

    #[test]
    fn converts_opb_negation() {
        let text = "min: +1 x1 +2 x2 ;\n+2 ~x1 +1 x2 >= 2 ;\n";
        let instance = mipio::opb::parse(text.as_bytes()).unwrap();
        let problem = problem_from_instance(&instance);

        assert_eq!(problem.n_cols(), 2);
        assert!(problem.is_binary(0));
        let (cols, vals) = problem.matrix().row_entries(0);
        assert_eq!(cols, &[0, 1]);
        assert_eq!(vals, &[-2.0, 1.0]);
        assert_eq!(problem.matrix().lhs()[0], 0.0);
    }
}
