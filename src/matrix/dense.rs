//! Dense ingestion format (spec §6): an ordered row-major sequence of
//! `rows * cols` floats plus explicit dimensions. The kernel owns the
//! conversion into the sparse substrate — a dense caller never sees CSR/CSC.

use crate::error::KernelError;
use crate::matrix::SparseMatrix;
use crate::matrix::builder::MatrixBuilder;

/// Convert a row-major dense buffer into the kernel's sparse substrate,
/// dropping explicit zeros the way [`MatrixBuilder`] does for any other
/// ingestion path.
pub fn from_dense_row_major(
    rows: usize,
    cols: usize,
    data: &[f64],
) -> Result<SparseMatrix, KernelError> {
    if data.len() != rows * cols {
        return Err(KernelError::DimensionMismatch {
            expected: rows * cols,
            actual: data.len(),
            context: "dense ingestion buffer",
        });
    }
    let mut b = MatrixBuilder::new(rows, cols);
    b.reserve(data.len());
    for i in 0..rows {
        for j in 0..cols {
            let v = data[i * cols + j];
            if !v.is_finite() {
                return Err(KernelError::NonFiniteValue { row: i, col: j });
            }
            if v != 0.0 {
                b.push(j, i, v)?;
            }
        }
    }
    let (csr, csc) = b.build_both()?;
    SparseMatrix::from_parts(csr, csc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_ingestion_matches_explicit_triplets() {
        // [[4, -1], [-1, 4]]
        let a = from_dense_row_major(2, 2, &[4.0, -1.0, -1.0, 4.0]).unwrap();
        assert_eq!(a.diagonal(0), 4.0);
        assert_eq!(a.diagonal(1), 4.0);
        assert_eq!(a.nnz(), 4);
    }

    #[test]
    fn dense_ingestion_drops_explicit_zeros() {
        let a = from_dense_row_major(2, 2, &[4.0, 0.0, 0.0, 4.0]).unwrap();
        assert_eq!(a.nnz(), 2);
    }

    #[test]
    fn dense_ingestion_rejects_wrong_length() {
        let err = from_dense_row_major(2, 2, &[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, KernelError::DimensionMismatch { .. }));
    }

    #[test]
    fn dense_ingestion_rejects_non_finite() {
        let err = from_dense_row_major(1, 1, &[f64::NAN]).unwrap_err();
        assert!(matches!(err, KernelError::NonFiniteValue { .. }));
    }
}
