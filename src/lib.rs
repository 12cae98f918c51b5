//! A sublinear-time solver kernel for asymmetric diagonally dominant
//! (ADD) linear systems (spec §1-§2). The crate exposes a single façade,
//! [`facade::Kernel`], over five estimators sharing a CSR/CSC substrate,
//! a deterministic xorshift RNG, and a uniform error taxonomy.
//!
//! Typical use starts with [`analyzer::MatrixAnalyzer::analyze`] to check
//! dominance and get a method recommendation, then a stateless
//! [`facade::Kernel::solve`] or [`facade::Kernel::estimate_entry`] call,
//! or [`facade::Kernel::solve_session`] when the right-hand side will be
//! updated incrementally.

pub mod analyzer;
pub mod context;
pub mod convergence;
pub mod error;
pub mod facade;
pub mod matrix;
pub mod numeric;
pub mod session;
pub mod solver;

pub use analyzer::{AnalysisReport, MatrixAnalyzer, RecommendedMethod};
pub use context::{CancelToken, Context, StopSignal};
pub use error::{KernelError, KernelResult};
pub use facade::Kernel;
pub use matrix::SparseMatrix;
pub use matrix::sparse_vector::{Delta, SparseVector};
pub use session::SessionId;
pub use solver::{EntryOutcome, Method, Options, SolveOutcome};
