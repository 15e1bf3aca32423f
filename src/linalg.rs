//! BLAS-1 style kernels over dense vectors and the sparse constraint matrix.
//!
//! Dot products that feed tolerance comparisons use compensated summation;
//! plain accumulation is fine inside the norm squares.

use crate::num::StableSum;
use crate::problem::ConstraintMatrix;

pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let mut sum = StableSum::new();
    for (a, b) in x.iter().zip(y) {
        sum.add(a * b);
    }
    sum.get()
}

pub fn l1_norm(x: &[f64]) -> f64 {
    let mut sum = StableSum::new();
    for v in x {
        sum.add(v.abs());
    }
    sum.get()
}

pub fn l2_norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `out = b - Ax`, row-wise over the sparse matrix.
pub fn residual(matrix: &ConstraintMatrix, x: &[f64], b: &[f64], out: &mut [f64]) {
    debug_assert_eq!(out.len(), matrix.n_rows());
    for row in 0..matrix.n_rows() {
        let (cols, vals) = matrix.row_entries(row);
        let mut sum = StableSum::new();
        sum.add(b[row]);
        for (&col, &val) in cols.iter().zip(vals) {
            sum.add(-val * x[col]);
        }
        out[row] = sum.get();
    }
}

/// `Ax - sub`, row-wise; allocates the result.
pub fn mat_vec_minus(matrix: &ConstraintMatrix, x: &[f64], sub: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; matrix.n_rows()];
    residual(matrix, x, sub, &mut out);
    for v in out.iter_mut() {
        *v = -*v;
    }
    out
}

/// `out = c - Aᵀπ`, column-wise over the sparse matrix.
pub fn reduced_costs(matrix: &ConstraintMatrix, pi: &[f64], c: &[f64], out: &mut [f64]) {
    debug_assert_eq!(out.len(), matrix.n_cols());
    for col in 0..matrix.n_cols() {
        let (rows, vals) = matrix.col_entries(col);
        let mut sum = StableSum::new();
        sum.add(c[col]);
        for (&row, &val) in rows.iter().zip(vals) {
            sum.add(-val * pi[row]);
        }
        out[col] = sum.get();
    }
}

/// `out = αx + βy`.
pub fn axpby(alpha: f64, x: &[f64], beta: f64, y: &[f64], out: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    debug_assert_eq!(x.len(), out.len());
    for i in 0..x.len() {
        out[i] = alpha * x[i] + beta * y[i];
    }
}

/// `out = y + s·x`.
pub fn add_scaled(y: &[f64], s: f64, x: &[f64], out: &mut [f64]) {
    axpby(s, x, 1.0, y, out);
}

pub fn negate_in_place(x: &mut [f64]) {
    for v in x.iter_mut() {
        *v = -*v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::ProblemBuilder;

    fn two_row_matrix() -> crate::problem::Problem {
        // rows: [1 2 0; 0 3 4]
        let mut builder = ProblemBuilder::new("kernel");
        for _ in 0..3 {
            builder.add_col(Some(0.0), Some(1.0), true, 1.0);
        }
        builder.add_row(None, Some(2.0), &[(0, 1.0), (1, 2.0)]);
        builder.add_row(None, Some(3.0), &[(1, 3.0), (2, 4.0)]);
        builder.build()
    }

    #[test]
    fn matrix_vector_product_minus_vector() {
        let problem = two_row_matrix();
        let res = mat_vec_minus(problem.matrix(), &[2.0, 3.0, 3.0], &[1.0, 2.0]);
        assert_eq!(res.len(), problem.n_rows());
        assert_eq!(res[0], 7.0);
        assert_eq!(res[1], 19.0);
    }

    #[test]
    fn residual_is_b_minus_ax() {
        let problem = two_row_matrix();
        let mut out = vec![0.0; 2];
        residual(problem.matrix(), &[1.0, 1.0, 1.0], &[2.0, 3.0], &mut out);
        assert_eq!(out[0], 2.0 - 3.0);
        assert_eq!(out[1], 3.0 - 7.0);
    }

    #[test]
    fn reduced_costs_subtract_transposed_product() {
        let problem = two_row_matrix();
        let mut out = vec![0.0; 3];
        reduced_costs(problem.matrix(), &[1.0, -1.0], &[0.0, 0.0, 0.0], &mut out);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[1], -2.0 + 3.0);
        assert_eq!(out[2], 4.0);
    }

    #[test]
    fn dot_is_permutation_invariant() {
        let x: Vec<f64> = (0..100).map(|i| (i as f64) * 1e10 + 0.1).collect();
        let y: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let forward = dot(&x, &y);
        let rx: Vec<f64> = x.iter().rev().copied().collect();
        let ry: Vec<f64> = y.iter().rev().copied().collect();
        let backward = dot(&rx, &ry);
        assert!((forward - backward).abs() < 1e-6);
    }

    #[test]
    fn negate_flips_signs_in_place() {
        let mut x = vec![1.0, -2.0, 0.0];
        negate_in_place(&mut x);
        assert_eq!(x, vec![-1.0, 2.0, 0.0]);
    }

    #[test]
    fn axpby_combines() {
        let mut out = vec![0.0; 2];
        axpby(0.5, &[2.0, 4.0], 0.5, &[0.0, 2.0], &mut out);
        assert_eq!(out, vec![1.0, 3.0]);
        let mut shifted = vec![0.0; 2];
        add_scaled(&[1.0, 1.0], 2.0, &[1.0, 2.0], &mut shifted);
        assert_eq!(shifted, vec![3.0, 5.0]);
    }
}
