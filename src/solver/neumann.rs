//! Neumann series solver (spec §4.4): fixed-point iteration of
//! `x <- D^-1 (b - R x)`, expressed as a running series term `t_k` so each
//! step is one matvec plus a diagonal scale.

use crate::context::{Context, StopSignal};
use crate::convergence::ConvergenceMonitor;
use crate::error::{KernelError, KernelResult};
use crate::matrix::SparseMatrix;
use crate::numeric::pool::PooledVec;
use crate::numeric::vector::{axpy, checked_div, norm2};
use crate::solver::{Method, Options, ProgressCallback, ProgressEvent, SolveOutcome, SolverStats};

/// `true` residual is recomputed on this cadence and on termination (spec
/// §4.4 rule 1); other iterations fall back to the cheap term-norm bound.
const RESIDUAL_RECOMPUTE_EVERY: u64 = 5;

#[derive(Debug, Clone)]
pub struct NeumannState {
    pub x: Vec<f64>,
    pub t: Vec<f64>,
    pub k: u64,
    pub last_residual: f64,
    d_inv: Vec<f64>,
    b: Vec<f64>,
}

impl NeumannState {
    fn new(matrix: &SparseMatrix, b: &[f64], tau_div: f64) -> KernelResult<Self> {
        let n = matrix.dim().nrows;
        let mut d_inv = vec![0.0; n];
        let mut t0 = vec![0.0; n];
        for i in 0..n {
            d_inv[i] = checked_div(1.0, matrix.diagonal(i), i, tau_div)?;
            t0[i] = b[i] * d_inv[i];
        }
        Ok(Self {
            x: t0.clone(),
            t: t0,
            k: 0,
            last_residual: f64::INFINITY,
            d_inv,
            b: b.to_vec(),
        })
    }

    /// One Neumann step: `t <- t - D^-1 M t`, `x <- x + t`.
    fn step(&mut self, matrix: &SparseMatrix, stats: &mut SolverStats) -> KernelResult<()> {
        let mut mt = PooledVec::acquire(self.t.len());
        #[cfg(feature = "parallel")]
        matrix.matvec_parallel(&self.t, &mut mt)?;
        #[cfg(not(feature = "parallel"))]
        matrix.matvec(&self.t, &mut mt)?;
        stats.matvec_count += 1;
        for i in 0..self.t.len() {
            self.t[i] -= mt[i] * self.d_inv[i];
        }
        axpy(1.0, &self.t, &mut self.x);
        self.k += 1;
        Ok(())
    }

    fn true_residual_norm(&self, matrix: &SparseMatrix, stats: &mut SolverStats) -> KernelResult<f64> {
        let mut r = PooledVec::acquire(self.x.len());
        matrix.matvec(&self.x, &mut r)?;
        stats.matvec_count += 1;
        for i in 0..r.len() {
            r[i] -= self.b[i];
        }
        Ok(norm2(&r))
    }
}

pub fn solve(
    matrix: &SparseMatrix,
    b: &[f64],
    options: &Options,
    ctx: &Context,
    mut progress: Option<&mut ProgressCallback>,
    started_at: std::time::Instant,
) -> KernelResult<SolveOutcome> {
    matrix.validate_for_solve(options.tau_div)?;
    if b.len() != matrix.dim().nrows {
        return Err(KernelError::DimensionMismatch {
            expected: matrix.dim().nrows,
            actual: b.len(),
            context: "neumann rhs",
        });
    }

    let mut state = NeumannState::new(matrix, b, options.tau_div)?;
    let mut stats = SolverStats::default();
    let mut monitor = ConvergenceMonitor::new(options.epsilon);
    let n_sqrt = (matrix.dim().nrows as f64).sqrt();

    loop {
        if let Some(signal) = ctx.check() {
            return Err(terminal_error(signal, state.k, state.last_residual, &state.x, ctx, started_at));
        }

        state.step(matrix, &mut stats)?;

        let recompute_true = state.k % RESIDUAL_RECOMPUTE_EVERY == 0 || state.k >= options.max_iterations;
        let residual_norm = if recompute_true {
            state.true_residual_norm(matrix, &mut stats)?
        } else {
            norm2(&state.t) * n_sqrt
        };
        state.last_residual = residual_norm;
        monitor.push(residual_norm);

        if let Some(cb) = progress.as_deref_mut() {
            cb(ProgressEvent {
                iteration: state.k,
                residual: residual_norm,
                elapsed_ns: ctx.elapsed_ns(started_at),
                rate: monitor.rate(),
                trend: monitor.trend(),
            });
        }

        if monitor.is_overflowing() {
            return Err(KernelError::NumericalInstability {
                iteration: state.k,
                residual: residual_norm,
            });
        }

        if recompute_true && monitor.converged() {
            return Ok(SolveOutcome {
                solution: state.x,
                iterations: state.k,
                residual: residual_norm,
                converged: true,
                method: Method::Neumann,
                stats,
                error_bound: None,
            });
        }

        if monitor.is_stagnant() {
            return Err(KernelError::Stagnated {
                iterations: state.k,
                residual: residual_norm,
            });
        }

        if state.k >= options.max_iterations {
            return Err(KernelError::DidNotConverge {
                max_iterations: options.max_iterations,
                residual: residual_norm,
                last_solution: state.x,
            });
        }
    }
}

fn terminal_error(
    signal: StopSignal,
    iteration: u64,
    residual: f64,
    x: &[f64],
    ctx: &Context,
    started_at: std::time::Instant,
) -> KernelError {
    match signal {
        StopSignal::Cancelled => KernelError::Cancelled {
            iteration,
            residual,
            last_solution: x.to_vec(),
        },
        StopSignal::TimedOut => KernelError::TimedOut {
            elapsed_ns: ctx.elapsed_ns(started_at),
            residual,
            last_solution: x.to_vec(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    fn scenario_1() -> (SparseMatrix, Vec<f64>) {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, -1.0, -1.0, 4.0])
            .unwrap();
        (m, vec![1.0, 2.0])
    }

    #[test]
    fn converges_on_small_dominant_system() {
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-10,
            ..Options::default()
        };
        let ctx = Context::new();
        let started_at = std::time::Instant::now();
        let outcome = solve(&m, &b, &options, &ctx, None, started_at).unwrap();
        assert!(outcome.converged);
        assert!((outcome.solution[0] - 0.4).abs() < 1e-6);
        assert!((outcome.solution[1] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn converges_within_twenty_iterations_for_scenario_two() {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[10.0, 1.0, -2.0, 5.0])
            .unwrap();
        let b = vec![11.0, 3.0];
        let options = Options {
            epsilon: 1e-8,
            max_iterations: 20,
            ..Options::default()
        };
        let ctx = Context::new();
        let started_at = std::time::Instant::now();
        let outcome = solve(&m, &b, &options, &ctx, None, started_at).unwrap();
        assert!(outcome.converged);
        assert!((outcome.solution[0] - 1.0).abs() < 1e-4);
        assert!((outcome.solution[1] - 1.0).abs() < 1e-4);
        assert!(outcome.iterations <= 20);
    }

    #[test]
    fn identity_matrix_converges_in_one_iteration() {
        let m = SparseMatrix::from_coo(3, 3, &[0, 1, 2], &[0, 1, 2], &[1.0, 1.0, 1.0]).unwrap();
        let b = vec![1.0, 2.0, 3.0];
        let options = Options::default();
        let ctx = Context::new();
        let started_at = std::time::Instant::now();
        let outcome = solve(&m, &b, &options, &ctx, None, started_at).unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.solution, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn tridiagonal_converges_within_fifty_iterations() {
        let n = 100;
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            vals.push(2.0);
            if i + 1 < n {
                rows.push(i);
                cols.push(i + 1);
                vals.push(-0.5);
                rows.push(i + 1);
                cols.push(i);
                vals.push(-0.5);
            }
        }
        let m = SparseMatrix::from_coo(n, n, &rows, &cols, &vals).unwrap();
        let b = vec![1.0; n];
        let options = Options {
            epsilon: 1e-6,
            max_iterations: 50,
            ..Options::default()
        };
        let ctx = Context::new();
        let started_at = std::time::Instant::now();
        let outcome = solve(&m, &b, &options, &ctx, None, started_at).unwrap();
        assert!(outcome.converged);
        assert!(outcome.solution.iter().all(|&x| x > 0.0));
    }

    #[test]
    fn cancellation_returns_best_effort_solution() {
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-300,
            max_iterations: 10_000,
            ..Options::default()
        };
        let ctx = Context::new();
        ctx.cancel();
        let started_at = std::time::Instant::now();
        let err = solve(&m, &b, &options, &ctx, None, started_at).unwrap_err();
        match err {
            KernelError::Cancelled { last_solution, .. } => assert_eq!(last_solution.len(), 2),
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }
}
