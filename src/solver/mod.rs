//! Solver kernel (spec §2 components 4-7, §4.4-4.7, §9 "shared estimator
//! base"): estimators over the shared sparse substrate, selected by a
//! plain `Method` sum type and dispatched with `match` in `facade`, so the
//! inner loop never pays for virtual dispatch.

pub mod hybrid;
pub mod neumann;
pub mod push;
pub mod random_walk;

use std::time::Duration;

use crate::analyzer::RecommendedMethod;

/// Which estimator a call used or was asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Neumann,
    ForwardPush,
    BackwardPush,
    Bidirectional,
    RandomWalk,
    Hybrid,
}

impl Method {
    pub fn label(&self) -> &'static str {
        match self {
            Method::Neumann => "neumann",
            Method::ForwardPush => "forward_push",
            Method::BackwardPush => "backward_push",
            Method::Bidirectional => "bidirectional",
            Method::RandomWalk => "random_walk",
            Method::Hybrid => "hybrid",
        }
    }

    pub fn from_recommendation(r: RecommendedMethod) -> Method {
        match r {
            RecommendedMethod::Neumann => Method::Neumann,
            RecommendedMethod::ForwardPush => Method::ForwardPush,
            RecommendedMethod::RandomWalkOrHybrid => Method::Hybrid,
            RecommendedMethod::Reject => Method::Neumann,
        }
    }
}

/// Caller-tunable knobs shared by every solve path (spec §4.9's `options`).
#[derive(Debug, Clone)]
pub struct Options {
    pub method: Method,
    pub epsilon: f64,
    pub max_iterations: u64,
    pub timeout: Option<Duration>,
    pub rng_seed: Option<u64>,
    pub tau_div: f64,
    /// Maximum steps a single random walk takes before forced absorption
    /// (spec §4.6, default 1000).
    pub max_walk_len: usize,
    /// Target confidence for the stochastic residual probe and the
    /// random-walk confidence interval.
    pub delta: f64,
    /// Proceed on a non-ADD matrix instead of failing with
    /// `NotDiagonallyDominant` (spec §8 "without override").
    pub allow_non_dominant: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            method: Method::Hybrid,
            epsilon: 1e-8,
            max_iterations: 1000,
            timeout: None,
            rng_seed: None,
            tau_div: crate::numeric::TAU_DIV,
            max_walk_len: 1000,
            delta: 0.05,
            allow_non_dominant: false,
        }
    }
}

impl Options {
    /// Looser tolerance, fewer iterations: mirrors the pre-distillation
    /// project's `NeumannSolver::fast()` preset, generalized to every
    /// method's `Options`.
    pub fn fast() -> Self {
        Self {
            epsilon: 1e-6,
            max_iterations: 200,
            ..Self::default()
        }
    }

    /// Tighter tolerance, more iterations: mirrors `::high_precision()`.
    pub fn high_precision() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 5000,
            ..Self::default()
        }
    }
}

/// `{iteration, residual, elapsed_ns, rate, trend}` (spec §6 "progress
/// event"), invoked inline on the iterating thread no more than once per
/// iteration.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub iteration: u64,
    pub residual: f64,
    pub elapsed_ns: u64,
    pub rate: f64,
    pub trend: crate::convergence::Trend,
}

pub type ProgressCallback<'a> = dyn FnMut(ProgressEvent) + 'a;

/// Running counters carried alongside a solve (spec §C "SolverStats").
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    pub matvec_count: u64,
}

/// Result of a full-vector solve (spec §4.9 `Result`, minus the
/// façade-level fields added by `facade::solve`).
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub solution: Vec<f64>,
    pub iterations: u64,
    pub residual: f64,
    pub converged: bool,
    pub method: Method,
    pub stats: SolverStats,
    pub error_bound: Option<(f64, f64)>,
}

/// Result of `estimate_entry` (spec §4.9 `EntryResult`).
#[derive(Debug, Clone, Copy)]
pub struct EntryOutcome {
    pub estimate: f64,
    pub variance: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub walks_completed: usize,
}

