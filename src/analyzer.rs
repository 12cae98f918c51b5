//! Matrix analyzer (spec §3 "matrix analysis report", §4.3): structural and
//! numerical properties computed in one CSR sweep plus one CSC sweep.

use crate::matrix::SparseMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedMethod {
    Neumann,
    ForwardPush,
    RandomWalkOrHybrid,
    Reject,
}

/// Structural/numerical properties of a matrix, produced once and cached
/// by callers — `analyze` is pure and idempotent on an immutable matrix
/// (spec §8).
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub is_row_dominant: bool,
    pub is_col_dominant: bool,
    pub dominance_gap: f64,
    pub is_symmetric: bool,
    pub sparsity: f64,
    pub bandwidth: usize,
    pub recommended_method: RecommendedMethod,
}

/// Tolerance used for the symmetry check: `|M_ij - M_ji| <= symmetry_tol`
/// is treated as equal.
const SYMMETRY_TOL: f64 = 1e-9;

pub struct MatrixAnalyzer;

impl MatrixAnalyzer {
    pub fn analyze(matrix: &SparseMatrix) -> AnalysisReport {
        let dim = matrix.dim();
        let n = dim.nrows;
        let csr = matrix.csr();
        let csc = matrix.csc();

        let mut is_row_dominant = true;
        let mut row_gap = f64::INFINITY;
        let mut bandwidth = 0usize;
        for i in 0..n {
            let d = csr.diagonal(i).abs();
            let off = csr.off_diag_abs_rowsum(i);
            if d <= off {
                is_row_dominant = false;
            }
            if d > 0.0 {
                row_gap = row_gap.min(((d - off) / d).max(0.0));
            } else {
                row_gap = 0.0;
            }
            let (cols, _) = csr.row(i);
            for &c in cols {
                bandwidth = bandwidth.max(c.abs_diff(i));
            }
        }
        if n == 0 {
            row_gap = 0.0;
        }

        let mut is_col_dominant = true;
        for j in 0..dim.ncols {
            let d = csc.diagonal(j).abs();
            let off = csc.off_diag_abs_colsum(j);
            if d <= off {
                is_col_dominant = false;
            }
        }

        let dominance_gap = row_gap.max(0.0);

        let is_symmetric = Self::check_symmetric(matrix, SYMMETRY_TOL);

        let sparsity = if n == 0 || dim.ncols == 0 {
            1.0
        } else {
            1.0 - (matrix.nnz() as f64) / (n as f64 * dim.ncols as f64)
        };

        let recommended_method = if !is_row_dominant && !is_col_dominant {
            RecommendedMethod::Reject
        } else if is_row_dominant && dominance_gap >= 0.3 {
            RecommendedMethod::Neumann
        } else if is_row_dominant && dominance_gap < 0.1 {
            RecommendedMethod::ForwardPush
        } else {
            RecommendedMethod::RandomWalkOrHybrid
        };

        AnalysisReport {
            is_row_dominant,
            is_col_dominant,
            dominance_gap,
            is_symmetric,
            sparsity,
            bandwidth,
            recommended_method,
        }
    }

    fn check_symmetric(matrix: &SparseMatrix, tol: f64) -> bool {
        let dim = matrix.dim();
        if !dim.is_square() {
            return false;
        }
        let csr = matrix.csr();
        for i in 0..dim.nrows {
            let (cols, vals) = csr.row(i);
            for (&j, &v) in cols.iter().zip(vals) {
                let (rows_j, vals_j) = matrix.csc().col(i);
                let found = rows_j.binary_search(&j).map(|k| vals_j[k]);
                match found {
                    Ok(vji) if (vji - v).abs() <= tol => {}
                    _ => return false,
                }
            }
        }
        true
    }
}
