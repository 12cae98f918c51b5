//! Crate-wide error taxonomy (spec §7). Each variant is a contractual label;
//! callers match on the variant, not on the message text.

use thiserror::Error;

use crate::matrix::error::{CscError, CsrError, MatrixError};

#[derive(Debug, Error)]
pub enum KernelError {
    // --- Input ---
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        context: &'static str,
    },

    #[error("index {index} out of range (max {max}) in {context}")]
    InvalidIndex {
        index: usize,
        max: usize,
        context: &'static str,
    },

    #[error("non-finite value at (row={row}, col={col})")]
    NonFiniteValue { row: usize, col: usize },

    #[error("unsupported ingestion format: {0}")]
    UnsupportedFormat(String),

    #[error("method {method} is not applicable to {operation}")]
    MethodNotApplicable {
        method: &'static str,
        operation: &'static str,
    },

    // --- Structural ---
    #[error("matrix is not diagonally dominant by row or column (row {row})")]
    NotDiagonallyDominant { row: usize },

    #[error("zero or near-zero diagonal at row {row}")]
    ZeroDiagonal { row: usize },

    #[error("row {row} has no nonzero entries")]
    SingularStructure { row: usize },

    // --- Numerical ---
    #[error("numerical instability detected at iteration {iteration} (residual={residual})")]
    NumericalInstability { iteration: u64, residual: f64 },

    #[error("stagnated after {iterations} iterations with no residual progress")]
    Stagnated { iterations: u64, residual: f64 },

    // --- Budget ---
    #[error("did not converge within {max_iterations} iterations (residual={residual})")]
    DidNotConverge {
        max_iterations: u64,
        residual: f64,
        last_solution: Vec<f64>,
    },

    #[error("timed out after {elapsed_ns} ns (residual={residual})")]
    TimedOut {
        elapsed_ns: u64,
        residual: f64,
        last_solution: Vec<f64>,
    },

    #[error("cancelled at iteration {iteration} (residual={residual})")]
    Cancelled {
        iteration: u64,
        residual: f64,
        last_solution: Vec<f64>,
    },

    #[error("random-walk budget exhausted after {walks_completed} of {walks_requested} walks")]
    BudgetExhausted {
        walks_completed: usize,
        walks_requested: usize,
    },

    // --- Operational ---
    #[error("session is busy on another thread")]
    SessionBusy,

    #[error("session is closed")]
    SessionClosed,

    #[error("internal invariant violation: {0}")]
    InternalError(String),

    // --- Wrapped substrate errors ---
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Csr(#[from] CsrError),

    #[error(transparent)]
    Csc(#[from] CscError),
}

impl KernelError {
    /// True for the budget-class errors that still carry a best-effort
    /// solution the caller may choose to accept (spec §7 propagation policy).
    pub fn carries_partial_result(&self) -> bool {
        matches!(
            self,
            KernelError::DidNotConverge { .. }
                | KernelError::TimedOut { .. }
                | KernelError::Cancelled { .. }
        )
    }
}

pub type KernelResult<T> = Result<T, KernelError>;
