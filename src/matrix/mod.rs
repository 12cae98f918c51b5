pub mod builder;
pub mod csc;
pub mod csr;
pub mod dense;
pub mod error;
pub mod mtx;
pub mod sparse_vector;

use crate::error::KernelError;

/// Shape shared by every matrix representation in the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim {
    pub nrows: usize,
    pub ncols: usize,
}

impl Dim {
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }
}

/// Read-only view shared by the CSR and CSC representations.
///
/// The solver kernel never dynamically type-checks a matrix to decide how
/// to traverse it; every estimator is written against this trait instead.
pub trait SparseMatrixView {
    fn dim(&self) -> Dim;
    fn nnz(&self) -> usize;

    /// `M_ii`, or 0.0 if no explicit entry is stored at `(i, i)`.
    fn diagonal(&self, i: usize) -> f64;

    /// `Σ_{j≠i} |M_ij|` along this view's primary axis (row for CSR, column
    /// for CSC).
    fn off_diag_abs_sum(&self, i: usize) -> f64;
}

/// The two canonical sparse storages the kernel keeps side by side: CSR for
/// row-major traversal (matvec, forward push), CSC for column-major
/// traversal (backward push, column-dominance checks).
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    dim: Dim,
    csr: csr::CsrMatrix,
    csc: csc::CscMatrix,
}

impl SparseMatrix {
    pub fn from_coo(
        rows: usize,
        cols: usize,
        row_indices: &[usize],
        col_indices: &[usize],
        values: &[f64],
    ) -> Result<Self, KernelError> {
        if row_indices.len() != col_indices.len() || row_indices.len() != values.len() {
            return Err(KernelError::DimensionMismatch {
                expected: row_indices.len(),
                actual: col_indices.len().min(values.len()),
                context: "coo triplet arrays must have equal length",
            });
        }
        let mut b = builder::MatrixBuilder::new(rows, cols);
        b.reserve(values.len());
        for ((&i, &j), &v) in row_indices.iter().zip(col_indices).zip(values) {
            if !v.is_finite() {
                return Err(KernelError::NonFiniteValue { row: i, col: j });
            }
            b.push(j, i, v)?;
        }
        let (csr, csc) = b.build_both()?;
        Self::from_parts(csr, csc)
    }

    pub fn from_parts(csr: csr::CsrMatrix, csc: csc::CscMatrix) -> Result<Self, KernelError> {
        csr.check_invariants()?;
        csc.check_invariants()?;
        if csr.dim.nrows != csc.dim.nrows || csr.dim.ncols != csc.dim.ncols {
            return Err(KernelError::DimensionMismatch {
                expected: csr.dim.nrows,
                actual: csc.dim.nrows,
                context: "csr/csc must share dimensions",
            });
        }
        for i in 0..csr.dim.nrows.min(csr.dim.ncols) {
            if (csr.diagonal(i) - csc.diagonal(i)).abs() > 0.0 {
                // csr/csc were built independently (e.g. via from_parts from
                // an external caller); the diagonal must agree exactly since
                // both are derived from the same triplet multiset.
                if csr.diagonal(i) != csc.diagonal(i) {
                    return Err(KernelError::DimensionMismatch {
                        expected: i,
                        actual: i,
                        context: "csr/csc diagonal mismatch",
                    });
                }
            }
        }
        let dim = csr.dim;
        Ok(Self { dim, csr, csc })
    }

    pub fn dim(&self) -> Dim {
        self.dim
    }

    pub fn nnz(&self) -> usize {
        self.csr.nnz()
    }

    pub fn csr(&self) -> &csr::CsrMatrix {
        &self.csr
    }

    pub fn csc(&self) -> &csc::CscMatrix {
        &self.csc
    }

    pub fn diagonal(&self, i: usize) -> f64 {
        self.csr.diagonal(i)
    }

    /// `y <- M x`. Requires `x.len() == ncols` and `y.len() == nrows`.
    pub fn matvec(&self, x: &[f64], y: &mut [f64]) -> Result<(), KernelError> {
        self.csr.matvec(x, y)
    }

    /// `y <- M x`, row range partitioned across worker threads (spec §5).
    /// Only available when built with the `parallel` feature.
    #[cfg(feature = "parallel")]
    pub fn matvec_parallel(&self, x: &[f64], y: &mut [f64]) -> Result<(), KernelError> {
        self.csr.matvec_parallel(x, y)
    }

    /// Structural/numerical validation shared by every solver entry point:
    /// square, no empty rows, no zero diagonal.
    pub fn validate_for_solve(&self, tau_div: f64) -> Result<(), KernelError> {
        if !self.dim.is_square() {
            return Err(KernelError::DimensionMismatch {
                expected: self.dim.nrows,
                actual: self.dim.ncols,
                context: "solver requires a square matrix",
            });
        }
        for i in 0..self.dim.nrows {
            let (cols, _) = self.csr.row(i);
            if cols.is_empty() {
                return Err(KernelError::SingularStructure { row: i });
            }
            if self.csr.diagonal(i).abs() < tau_div {
                return Err(KernelError::ZeroDiagonal { row: i });
            }
        }
        Ok(())
    }
}
