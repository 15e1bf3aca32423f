//! The immutable MILP container shared by all heuristic replicas.
//!
//! Rows are stored both row-wise and column-wise so that propagation can walk
//! the rows of a column and the volume algorithm can walk the columns of a
//! row without transposing on the fly.

use crate::num::Num;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowFlags(u8);

impl RowFlags {
    pub const LHS_INF: RowFlags = RowFlags(1);
    pub const RHS_INF: RowFlags = RowFlags(2);
    pub const EQUATION: RowFlags = RowFlags(4);
    pub const REDUNDANT: RowFlags = RowFlags(8);

    pub fn test(&self, flag: RowFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: RowFlags) {
        self.0 |= flag.0;
    }

    pub fn unset(&mut self, flag: RowFlags) {
        self.0 &= !flag.0;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColFlags(u8);

impl ColFlags {
    pub const LB_INF: ColFlags = ColFlags(1);
    pub const UB_INF: ColFlags = ColFlags(2);
    pub const INTEGRAL: ColFlags = ColFlags(4);
    pub const FIXED: ColFlags = ColFlags(8);
    pub const INACTIVE: ColFlags = ColFlags(16);

    pub fn test(&self, flag: ColFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: ColFlags) {
        self.0 |= flag.0;
    }

    pub fn unset(&mut self, flag: ColFlags) {
        self.0 &= !flag.0;
    }
}

/// Sparse row/column storage together with the row sides.
#[derive(Clone, Debug, Default)]
pub struct ConstraintMatrix {
    n_cols: usize,
    row_start: Vec<usize>,
    row_cols: Vec<usize>,
    row_vals: Vec<f64>,
    col_start: Vec<usize>,
    col_rows: Vec<usize>,
    col_vals: Vec<f64>,
    lhs: Vec<f64>,
    rhs: Vec<f64>,
    row_flags: Vec<RowFlags>,
}

impl ConstraintMatrix {
    pub fn n_rows(&self) -> usize {
        self.row_flags.len()
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn row_entries(&self, row: usize) -> (&[usize], &[f64]) {
        let range = self.row_start[row]..self.row_start[row + 1];
        (&self.row_cols[range.clone()], &self.row_vals[range])
    }

    pub fn col_entries(&self, col: usize) -> (&[usize], &[f64]) {
        let range = self.col_start[col]..self.col_start[col + 1];
        (&self.col_rows[range.clone()], &self.col_vals[range])
    }

    pub fn lhs(&self) -> &[f64] {
        &self.lhs
    }

    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    pub fn row_flags(&self) -> &[RowFlags] {
        &self.row_flags
    }

    pub fn set_row_rhs(&mut self, row: usize, rhs: f64) {
        self.rhs[row] = rhs;
        self.row_flags[row].unset(RowFlags::RHS_INF);
    }

    pub fn mark_redundant(&mut self, row: usize) {
        self.row_flags[row].set(RowFlags::REDUNDANT);
    }

    /// Appends a row and re-derives the column-wise storage.
    pub fn add_row(&mut self, cols: &[usize], vals: &[f64], lhs: Option<f64>, rhs: Option<f64>) {
        debug_assert_eq!(cols.len(), vals.len());
        debug_assert!(lhs.is_some() || rhs.is_some());

        let mut flags = RowFlags::default();
        match lhs {
            Some(_) => {}
            None => flags.set(RowFlags::LHS_INF),
        }
        match rhs {
            Some(_) => {}
            None => flags.set(RowFlags::RHS_INF),
        }
        let lhs = lhs.unwrap_or(f64::NEG_INFINITY);
        let rhs = rhs.unwrap_or(f64::INFINITY);
        if lhs == rhs {
            flags.set(RowFlags::EQUATION);
        }

        self.row_cols.extend_from_slice(cols);
        self.row_vals.extend_from_slice(vals);
        self.row_start.push(self.row_cols.len());
        self.lhs.push(lhs);
        self.rhs.push(rhs);
        self.row_flags.push(flags);
        self.rebuild_columns();
    }

    fn rebuild_columns(&mut self) {
        let mut counts = vec![0usize; self.n_cols + 1];
        for &col in &self.row_cols {
            counts[col + 1] += 1;
        }
        for i in 0..self.n_cols {
            counts[i + 1] += counts[i];
        }
        self.col_start = counts.clone();
        self.col_rows = vec![0; self.row_cols.len()];
        self.col_vals = vec![0.0; self.row_cols.len()];
        let mut next = counts;
        for row in 0..self.n_rows() {
            for k in self.row_start[row]..self.row_start[row + 1] {
                let col = self.row_cols[k];
                let slot = next[col];
                self.col_rows[slot] = row;
                self.col_vals[slot] = self.row_vals[k];
                next[col] += 1;
            }
        }
    }
}

/// Immutable input of one heuristic run. Shared read-only by all replicas.
#[derive(Clone, Debug)]
pub struct Problem {
    name: String,
    objective: Vec<f64>,
    obj_offset: f64,
    matrix: ConstraintMatrix,
    lower: Vec<f64>,
    upper: Vec<f64>,
    col_flags: Vec<ColFlags>,
}

impl Problem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn n_cols(&self) -> usize {
        self.lower.len()
    }

    pub fn n_rows(&self) -> usize {
        self.matrix.n_rows()
    }

    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn obj_offset(&self) -> f64 {
        self.obj_offset
    }

    pub fn matrix(&self) -> &ConstraintMatrix {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut ConstraintMatrix {
        &mut self.matrix
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    pub fn lower_bounds_mut(&mut self) -> &mut [f64] {
        &mut self.lower
    }

    pub fn upper_bounds_mut(&mut self) -> &mut [f64] {
        &mut self.upper
    }

    pub fn col_flags(&self) -> &[ColFlags] {
        &self.col_flags
    }

    pub fn is_integral(&self, col: usize) -> bool {
        self.col_flags[col].test(ColFlags::INTEGRAL)
    }

    /// An integer column with domain exactly {0, 1}.
    pub fn is_binary(&self, col: usize) -> bool {
        self.is_integral(col)
            && !self.col_flags[col].test(ColFlags::LB_INF)
            && !self.col_flags[col].test(ColFlags::UB_INF)
            && self.lower[col] == 0.0
            && self.upper[col] == 1.0
    }

    pub fn num_integral_cols(&self) -> usize {
        (0..self.n_cols()).filter(|&j| self.is_integral(j)).count()
    }

    /// Activity range of `row` under the given bounds, together with the
    /// number of infinite contributors on each side.
    pub fn row_activity(
        &self,
        row: usize,
        lower: &[f64],
        upper: &[f64],
        flags: &[ColFlags],
    ) -> ActivityRange {
        let mut range = ActivityRange::default();
        let (cols, vals) = self.matrix.row_entries(row);
        for (&col, &val) in cols.iter().zip(vals) {
            if val > 0.0 {
                if flags[col].test(ColFlags::LB_INF) {
                    range.ninf_min += 1;
                } else {
                    range.min += val * lower[col];
                }
                if flags[col].test(ColFlags::UB_INF) {
                    range.ninf_max += 1;
                } else {
                    range.max += val * upper[col];
                }
            } else {
                if flags[col].test(ColFlags::UB_INF) {
                    range.ninf_min += 1;
                } else {
                    range.min += val * upper[col];
                }
                if flags[col].test(ColFlags::LB_INF) {
                    range.ninf_max += 1;
                } else {
                    range.max += val * lower[col];
                }
            }
        }
        range
    }
}

/// Finite parts of a row's attainable activity plus infinity counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ActivityRange {
    pub min: f64,
    pub max: f64,
    pub ninf_min: u32,
    pub ninf_max: u32,
}

/// Incremental construction of a [`Problem`], mirroring how instances are
/// assembled from parsed files and in tests.
#[derive(Default)]
pub struct ProblemBuilder {
    name: String,
    objective: Vec<f64>,
    obj_offset: f64,
    lower: Vec<f64>,
    upper: Vec<f64>,
    col_flags: Vec<ColFlags>,
    rows: Vec<(Vec<usize>, Vec<f64>, Option<f64>, Option<f64>)>,
}

impl ProblemBuilder {
    pub fn new(name: &str) -> ProblemBuilder {
        ProblemBuilder {
            name: name.to_string(),
            ..ProblemBuilder::default()
        }
    }

    pub fn set_obj_offset(&mut self, offset: f64) {
        self.obj_offset = offset;
    }

    /// Adds a column; `None` bounds are infinite.
    pub fn add_col(
        &mut self,
        lb: Option<f64>,
        ub: Option<f64>,
        integral: bool,
        obj: f64,
    ) -> usize {
        let idx = self.lower.len();
        let mut flags = ColFlags::default();
        if lb.is_none() {
            flags.set(ColFlags::LB_INF);
        }
        if ub.is_none() {
            flags.set(ColFlags::UB_INF);
        }
        if integral {
            flags.set(ColFlags::INTEGRAL);
        }
        self.lower.push(lb.unwrap_or(f64::NEG_INFINITY));
        self.upper.push(ub.unwrap_or(f64::INFINITY));
        self.col_flags.push(flags);
        self.objective.push(obj);
        idx
    }

    /// Adds a row; at least one side must be finite.
    pub fn add_row(&mut self, lhs: Option<f64>, rhs: Option<f64>, entries: &[(usize, f64)]) -> usize {
        assert!(lhs.is_some() || rhs.is_some());
        let idx = self.rows.len();
        let cols = entries.iter().map(|e| e.0).collect();
        let vals = entries.iter().map(|e| e.1).collect();
        self.rows.push((cols, vals, lhs, rhs));
        idx
    }

    pub fn build(self) -> Problem {
        let n_cols = self.lower.len();
        let num = Num::default();

        let mut row_start = vec![0usize];
        let mut row_cols = Vec::new();
        let mut row_vals = Vec::new();
        let mut lhs = Vec::with_capacity(self.rows.len());
        let mut rhs = Vec::with_capacity(self.rows.len());
        let mut row_flags = Vec::with_capacity(self.rows.len());

        for (cols, vals, row_lhs, row_rhs) in &self.rows {
            row_cols.extend_from_slice(cols);
            row_vals.extend_from_slice(vals);
            row_start.push(row_cols.len());

            let mut flags = RowFlags::default();
            if row_lhs.is_none() {
                flags.set(RowFlags::LHS_INF);
            }
            if row_rhs.is_none() {
                flags.set(RowFlags::RHS_INF);
            }
            let l = row_lhs.unwrap_or(f64::NEG_INFINITY);
            let r = row_rhs.unwrap_or(f64::INFINITY);
            if row_lhs.is_some() && row_rhs.is_some() && num.is_eq(l, r) {
                flags.set(RowFlags::EQUATION);
            }
            lhs.push(l);
            rhs.push(r);
            row_flags.push(flags);
        }

        let mut matrix = ConstraintMatrix {
            n_cols,
            row_start,
            row_cols,
            row_vals,
            col_start: Vec::new(),
            col_rows: Vec::new(),
            col_vals: Vec::new(),
            lhs,
            rhs,
            row_flags,
        };
        matrix.rebuild_columns();

        Problem {
            name: self.name,
            objective: self.objective,
            obj_offset: self.obj_offset,
            matrix,
            lower: self.lower,
            upper: self.upper,
            col_flags: self.col_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn knapsack_problem() -> Problem {
        let mut builder = ProblemBuilder::new("knapsack");
        for obj in [3.0, -5.0, 1.0] {
            builder.add_col(Some(0.0), Some(1.0), true, obj);
        }
        builder.add_row(None, Some(2.0), &[(0, 1.0), (1, 1.0), (2, 1.0)]);
        builder.add_row(Some(1.0), Some(1.0), &[(0, 1.0), (1, 1.0)]);
        builder.build()
    }

    #[test]
    fn builder_sets_flags() {
        let problem = knapsack_problem();
        assert_eq!(problem.n_cols(), 3);
        assert_eq!(problem.n_rows(), 2);
        assert!(problem.matrix().row_flags()[0].test(RowFlags::LHS_INF));
        assert!(!problem.matrix().row_flags()[0].test(RowFlags::RHS_INF));
        assert!(problem.matrix().row_flags()[1].test(RowFlags::EQUATION));
        assert!(problem.is_binary(0));
    }

    #[test]
    fn column_storage_matches_rows() {
        let problem = knapsack_problem();
        let (rows, vals) = problem.matrix().col_entries(1);
        assert_eq!(rows, &[0, 1]);
        assert_eq!(vals, &[1.0, 1.0]);
        let (rows, _) = problem.matrix().col_entries(2);
        assert_eq!(rows, &[0]);
    }

    #[test]
    fn activity_range_counts_infinities() {
        let mut builder = ProblemBuilder::new("activity");
        builder.add_col(Some(0.0), None, false, 0.0);
        builder.add_col(Some(-1.0), Some(2.0), false, 0.0);
        builder.add_row(None, Some(4.0), &[(0, 1.0), (1, -2.0)]);
        let problem = builder.build();
        let range = problem.row_activity(
            0,
            problem.lower_bounds(),
            problem.upper_bounds(),
            problem.col_flags(),
        );
        // min: 1*0 + (-2)*2 = -4, max: inf (x0 unbounded above) + (-2)*(-1)
        assert_eq!(range.min, -4.0);
        assert_eq!(range.ninf_min, 0);
        assert_eq!(range.ninf_max, 1);
        assert_eq!(range.max, 2.0);
    }

    #[test]
    fn add_row_extends_column_storage() {
        let mut problem = knapsack_problem();
        problem
            .matrix_mut()
            .add_row(&[0, 2], &[1.0, -1.0], Some(0.0), None);
        assert_eq!(problem.n_rows(), 3);
        let (rows, vals) = problem.matrix().col_entries(2);
        assert_eq!(rows, &[0, 2]);
        assert_eq!(vals, &[1.0, -1.0]);
    }
}
