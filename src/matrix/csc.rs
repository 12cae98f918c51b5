use crate::error::KernelError;
use crate::matrix::csr::CsrMatrix;
use crate::matrix::error::CscError;
use crate::matrix::{Dim, SparseMatrixView};

/// Compressed Sparse Column matrix
/// - column pointers are the indices of the start and end of each column
/// - row indices are the indices of the rows of the non zero values
/// - values are the non zero values
#[derive(Debug, Clone)]
pub struct CscMatrix {
    pub dim: Dim,
    /// Column pointers, len = ncols + 1
    pub column_pointers: Vec<usize>,
    /// Row indices, len = nnz
    pub row_indices: Vec<usize>,
    /// Nonzero values, len = nnz
    pub values: Vec<f64>,
}

impl CscMatrix {
    /// number of non zero values
    pub fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    pub fn check_invariants(&self) -> Result<(), CscError> {
        if self.column_pointers.len() != self.dim.ncols + 1 {
            return Err(CscError::InvalidColumnPointersLength {
                expected: self.dim.ncols + 1,
                actual: self.column_pointers.len(),
            });
        }
        if *self.column_pointers.first().unwrap_or(&1) != 0 {
            return Err(CscError::InvalidColumnPointers {
                index: 0,
                expected: 0,
                actual: *self.column_pointers.first().unwrap_or(&1),
            });
        }
        if *self.column_pointers.last().unwrap() != self.nnz() {
            return Err(CscError::InvalidColumnPointers {
                index: self.dim.ncols,
                expected: self.nnz(),
                actual: *self.column_pointers.last().unwrap(),
            });
        }
        if self.row_indices.len() != self.values.len() {
            return Err(CscError::RowIndicesValuesLengthMismatch {
                values: self.values.len(),
                row_indices: self.row_indices.len(),
            });
        }
        // per-column sorted & in-range
        for j in 0..self.dim.ncols {
            let (start, end) = (self.column_pointers[j], self.column_pointers[j + 1]);
            if start > end || end > self.nnz() {
                return Err(CscError::InvalidColumnPointers {
                    index: j,
                    expected: start,
                    actual: end,
                });
            }
            let mut prev = None;
            for &r in &self.row_indices[start..end] {
                if r >= self.dim.nrows {
                    return Err(CscError::OutOfBoundsIndex {
                        index: r,
                        max: self.dim.nrows,
                    });
                }
                if let Some(p) = prev {
                    if r <= p {
                        return Err(CscError::RowsNotStrictlyIncreasing {
                            index: j,
                            expected: p,
                            actual: r,
                        });
                    }
                }
                prev = Some(r);
            }
        }
        Ok(())
    }

    /// Return (row_indices, values) slice for column j
    pub fn col(&self, j: usize) -> (&[usize], &[f64]) {
        let (s, e) = (self.column_pointers[j], self.column_pointers[j + 1]);
        (&self.row_indices[s..e], &self.values[s..e])
    }

    /// `M_ii` via binary search within column `i` (row indices are sorted).
    pub fn diagonal(&self, i: usize) -> f64 {
        let (rows, vals) = self.col(i);
        match rows.binary_search(&i) {
            Ok(k) => vals[k],
            Err(_) => 0.0,
        }
    }

    /// `Σ_{i≠j} |M_ij|` summed down column `j` — the column-dominance analogue
    /// of `CsrMatrix::off_diag_abs_rowsum`.
    pub fn off_diag_abs_colsum(&self, j: usize) -> f64 {
        let (rows, vals) = self.col(j);
        rows.iter()
            .zip(vals)
            .filter(|&(&r, _)| r != j)
            .map(|(_, &v)| v.abs())
            .sum()
    }

    /// `y[rows] += alpha * x` (in-place axpy into dense positions of column j).
    pub fn axpy_into_dense_col(&self, j: usize, x: f64, y: &mut [f64]) {
        let (rows, vals) = self.col(j);
        for (&i, &a) in rows.iter().zip(vals.iter()) {
            y[i] += x * a;
        }
    }

    /// Apply a column permutation: returns `A(:, q)` where `q` maps `new_j -> old_j`.
    pub fn permute_columns(&self, q: &[usize]) -> CscMatrix {
        assert_eq!(q.len(), self.dim.ncols);
        let mut column_pointers = Vec::with_capacity(self.dim.ncols + 1);
        column_pointers.push(0);
        let mut row_indices = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());

        for &old_j in q {
            let (rows, vals) = self.col(old_j);
            column_pointers.push(column_pointers.last().unwrap() + rows.len());
            row_indices.extend_from_slice(rows);
            values.extend_from_slice(vals);
        }
        CscMatrix {
            dim: self.dim,
            column_pointers,
            row_indices,
            values,
        }
    }

    /// Transpose into CSR. O(n + nnz) via a counting sort by row; preserves
    /// the (i, j, v) triplet multiset exactly.
    pub fn transpose_to_csr(&self) -> CsrMatrix {
        let m = self.dim.nrows;
        let n = self.dim.ncols;
        let nnz = self.nnz();

        let mut rp = vec![0usize; m + 1];
        for &r in &self.row_indices {
            rp[r + 1] += 1;
        }
        for i in 0..m {
            rp[i + 1] += rp[i];
        }

        let mut ci = vec![0usize; nnz];
        let mut cx = vec![0f64; nnz];
        let mut next = rp.clone();

        for j in 0..n {
            let (rows, vals) = self.col(j);
            for (&r, &v) in rows.iter().zip(vals.iter()) {
                let p = next[r];
                ci[p] = j;
                cx[p] = v;
                next[r] += 1;
            }
        }
        CsrMatrix {
            dim: Dim {
                nrows: m,
                ncols: n,
            },
            row_pointers: rp,
            column_indices: ci,
            values: cx,
        }
    }

    pub fn is_square(&self) -> bool {
        self.dim.is_square()
    }
}

impl SparseMatrixView for CscMatrix {
    fn dim(&self) -> Dim {
        self.dim
    }

    fn nnz(&self) -> usize {
        self.nnz()
    }

    fn diagonal(&self, i: usize) -> f64 {
        self.diagonal(i)
    }

    fn off_diag_abs_sum(&self, i: usize) -> f64 {
        self.off_diag_abs_colsum(i)
    }
}

impl TryFrom<&CsrMatrix> for CscMatrix {
    type Error = KernelError;

    fn try_from(csr: &CsrMatrix) -> Result<Self, KernelError> {
        // Transposing CSR (row-major) into CSC (column-major) with the same
        // (row, col) pairing is the same counting-sort as CSC -> CSR, just
        // keyed by column instead of row.
        let m = csr.dim.nrows;
        let n = csr.dim.ncols;
        let nnz = csr.nnz();

        let mut cp = vec![0usize; n + 1];
        for &c in &csr.column_indices {
            cp[c + 1] += 1;
        }
        for j in 0..n {
            cp[j + 1] += cp[j];
        }

        let mut ri = vec![0usize; nnz];
        let mut rx = vec![0f64; nnz];
        let mut next = cp.clone();

        for i in 0..m {
            let (cols, vals) = csr.row(i);
            for (&c, &v) in cols.iter().zip(vals.iter()) {
                let p = next[c];
                ri[p] = i;
                rx[p] = v;
                next[c] += 1;
            }
        }

        Ok(CscMatrix {
            dim: csr.dim,
            column_pointers: cp,
            row_indices: ri,
            values: rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::builder::MatrixBuilder;

    #[test]
    fn build_and_access() {
        let mut b = MatrixBuilder::new(3, 3);
        b.push(0, 0, 10.0).unwrap();
        b.push(2, 0, 3.0).unwrap();
        b.push(1, 1, 20.0).unwrap();
        b.push(0, 2, 2.0).unwrap();
        b.push(2, 2, 30.0).unwrap();
        b.push(2, 2, 5.0).unwrap();

        let a = b.build_csc().unwrap();
        assert_eq!(a.nnz(), 5);

        let (r0, v0) = a.col(0);
        assert_eq!(r0, &[0, 2]);
        assert_eq!(v0, &[10.0, 2.0]);

        let (r2, v2) = a.col(2);
        assert_eq!(r2, &[0, 2]);
        assert_eq!(v2, &[3.0, 35.0]);

        assert!(a.check_invariants().is_ok());
    }

    #[test]
    fn diagonal_and_off_diag_colsum() {
        let mut b = MatrixBuilder::new(2, 2);
        b.push(0, 0, 4.0).unwrap();
        b.push(1, 0, -1.0).unwrap();
        b.push(0, 1, -1.0).unwrap();
        b.push(1, 1, 4.0).unwrap();
        let a = b.build_csc().unwrap();

        assert_eq!(a.diagonal(0), 4.0);
        assert_eq!(a.off_diag_abs_colsum(0), 1.0);
    }

    #[test]
    fn csr_csc_roundtrip_preserves_triplets() {
        let mut b = MatrixBuilder::new(3, 3);
        let entries = [
            (0usize, 0usize, 10.0),
            (2, 0, 3.0),
            (1, 1, 20.0),
            (0, 2, 2.0),
            (2, 2, 35.0),
        ];
        for &(c, r, v) in &entries {
            b.push(c, r, v).unwrap();
        }
        let csc = b.build_csc().unwrap();
        let csr = csc.transpose_to_csr();
        let csc_back = CscMatrix::try_from(&csr).unwrap();

        assert_eq!(csc.column_pointers, csc_back.column_pointers);
        assert_eq!(csc.row_indices, csc_back.row_indices);
        assert_eq!(csc.values, csc_back.values);
    }
}
