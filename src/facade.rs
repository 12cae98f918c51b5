//! Solver façade (spec §4.9): the uniform operation surface — method
//! selection, timeouts/cancellation, progress emission, and session state
//! for incremental solves. Owns a session arena rather than a global
//! singleton (spec §9 "session ownership").

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::analyzer::{AnalysisReport, MatrixAnalyzer};
use crate::context::Context;
use crate::error::{KernelError, KernelResult};
use crate::matrix::SparseMatrix;
use crate::matrix::sparse_vector::Delta;
use crate::session::{Session, SessionId};
use crate::solver::{
    EntryOutcome, Method, Options, ProgressCallback, SolveOutcome, hybrid, neumann, push,
    random_walk,
};

/// Kernel-internal container of live sessions, keyed by `SessionId` (spec
/// §9: "an arena indexed by session id", never a shared mutable
/// singleton). Instantiate one `Kernel` per caller; nothing here is global.
#[derive(Default)]
pub struct Kernel {
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_id: AtomicU64,
}

fn default_seed(options: &Options) -> u64 {
    options.rng_seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e3779b97f4a7c15)
    })
}

fn check_dominance(matrix: &SparseMatrix, options: &Options) -> KernelResult<AnalysisReport> {
    let report = MatrixAnalyzer::analyze(matrix);
    if !options.allow_non_dominant && !report.is_row_dominant && !report.is_col_dominant {
        let row = (0..matrix.dim().nrows)
            .find(|&i| matrix.diagonal(i).abs() <= matrix.csr().off_diag_abs_rowsum(i))
            .unwrap_or(0);
        return Err(KernelError::NotDiagonallyDominant { row });
    }
    Ok(report)
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Pure; fails only on the structural errors surfaced by matrix
    /// construction itself (spec §4.9).
    pub fn analyze(&self, matrix: &SparseMatrix) -> AnalysisReport {
        MatrixAnalyzer::analyze(matrix)
    }

    /// Stateless full-vector solve (spec §4.9 `solve`).
    pub fn solve(
        &self,
        matrix: &SparseMatrix,
        b: &[f64],
        options: &Options,
    ) -> KernelResult<SolveOutcome> {
        self.solve_with_progress(matrix, b, options, None)
    }

    pub fn solve_with_progress(
        &self,
        matrix: &SparseMatrix,
        b: &[f64],
        options: &Options,
        progress: Option<&mut ProgressCallback>,
    ) -> KernelResult<SolveOutcome> {
        check_dominance(matrix, options)?;
        let ctx = match options.timeout {
            Some(t) => Context::with_timeout(t),
            None => Context::new(),
        };
        let started_at = Instant::now();
        dispatch_solve(matrix, b, options, &ctx, progress, started_at)
    }

    /// Single coordinate with mean, variance, interval (spec §4.9
    /// `estimate_entry`).
    pub fn estimate_entry(
        &self,
        matrix: &SparseMatrix,
        b: &[f64],
        row: usize,
        options: &Options,
    ) -> KernelResult<EntryOutcome> {
        check_dominance(matrix, options)?;
        let ctx = match options.timeout {
            Some(t) => Context::with_timeout(t),
            None => Context::new(),
        };
        let seed = default_seed(options);
        dispatch_entry(matrix, b, row, options, &ctx, seed)
    }

    /// Runs a stateful solve and opens a session the caller can later
    /// resume with `solve_incremental`.
    pub fn solve_session(
        &self,
        matrix: Arc<SparseMatrix>,
        b: &[f64],
        options: &Options,
    ) -> KernelResult<(SessionId, SolveOutcome)> {
        check_dominance(&matrix, options)?;
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let seed = default_seed(options);
        let mut session = Session::new(matrix, options.clone(), seed);
        session.b = b.to_vec();

        let ctx = Context::with_cancel_token(session.cancel.clone(), options.timeout);
        let outcome = dispatch_solve(&session.matrix, &session.b, &session.options, &ctx, None, Instant::now())?;
        session.last_outcome = Some(outcome.clone());

        self.sessions.lock().unwrap().insert(id, session);
        Ok((id, outcome))
    }

    /// Apply `delta` to the session's `b` and resume solving (spec §4.9
    /// `solve_incremental`). Creates a session carrying `matrix`/`options`
    /// if `session_id` is absent.
    pub fn solve_incremental(
        &self,
        session_id: SessionId,
        matrix: Option<Arc<SparseMatrix>>,
        options: Option<&Options>,
        delta: &Delta,
    ) -> KernelResult<SolveOutcome> {
        let mut sessions = self.sessions.lock().unwrap();
        if !sessions.contains_key(&session_id) {
            let matrix = matrix.ok_or(KernelError::SessionClosed)?;
            let options = options.cloned().unwrap_or_default();
            check_dominance(&matrix, &options)?;
            let seed = default_seed(&options);
            let session = Session::new(matrix, options, seed);
            sessions.insert(session_id, session);
        }
        let session = sessions.get_mut(&session_id).unwrap();
        let mut guard = session.try_acquire()?;

        delta.apply_to(&mut guard.b);
        let ctx = Context::with_cancel_token(guard.cancel.clone(), guard.options.timeout);
        let outcome = dispatch_solve(&guard.matrix, &guard.b, &guard.options, &ctx, None, Instant::now())?;
        guard.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Cooperative stop request; observed at the next iteration boundary.
    pub fn cancel(&self, session_id: SessionId) -> KernelResult<()> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions.get(&session_id).ok_or(KernelError::SessionClosed)?;
        session.cancel.cancel();
        Ok(())
    }

    pub fn close(&self, session_id: SessionId) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.close();
        }
    }
}

fn dispatch_solve(
    matrix: &SparseMatrix,
    b: &[f64],
    options: &Options,
    ctx: &Context,
    progress: Option<&mut ProgressCallback>,
    started_at: Instant,
) -> KernelResult<SolveOutcome> {
    match options.method {
        Method::Neumann => neumann::solve(matrix, b, options, ctx, progress, started_at),
        Method::ForwardPush | Method::Bidirectional => push::forward_push(matrix, b, options, ctx),
        Method::BackwardPush => push::backward_push(matrix, b, options, ctx),
        Method::Hybrid => hybrid::hybrid_solve(matrix, b, options, ctx),
        Method::RandomWalk => Err(KernelError::MethodNotApplicable {
            method: Method::RandomWalk.label(),
            operation: "solve (a full-vector result); use estimate_entry instead",
        }),
    }
}

fn dispatch_entry(
    matrix: &SparseMatrix,
    b: &[f64],
    row: usize,
    options: &Options,
    ctx: &Context,
    seed: u64,
) -> KernelResult<EntryOutcome> {
    match options.method {
        #[cfg(feature = "parallel")]
        Method::RandomWalk => random_walk::estimate_entry_parallel(matrix, b, row, options, ctx, seed),
        #[cfg(not(feature = "parallel"))]
        Method::RandomWalk => random_walk::estimate_entry(matrix, b, row, options, ctx, seed),
        Method::Hybrid => hybrid::hybrid_entry(matrix, b, row, options, ctx, seed),
        Method::Bidirectional => {
            let (estimate, _) = push::bidirectional_entry(matrix, b, row, options, ctx)?;
            Ok(EntryOutcome {
                estimate,
                variance: 0.0,
                ci_lower: estimate,
                ci_upper: estimate,
                walks_completed: 0,
            })
        }
        Method::BackwardPush => {
            let e_t = push::unit_vector(matrix.dim().nrows, row);
            let y = push::backward_push(matrix, &e_t, options, ctx)?;
            let estimate = crate::numeric::vector::dot(&y.solution, b);
            Ok(EntryOutcome {
                estimate,
                variance: 0.0,
                ci_lower: estimate,
                ci_upper: estimate,
                walks_completed: 0,
            })
        }
        Method::Neumann | Method::ForwardPush => {
            let outcome = dispatch_solve(matrix, b, options, ctx, None, Instant::now())?;
            let estimate = outcome.solution[row];
            Ok(EntryOutcome {
                estimate,
                variance: 0.0,
                ci_lower: estimate,
                ci_upper: estimate,
                walks_completed: 0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SparseMatrix;

    fn scenario_1() -> (Arc<SparseMatrix>, Vec<f64>) {
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[4.0, -1.0, -1.0, 4.0])
            .unwrap();
        (Arc::new(m), vec![1.0, 2.0])
    }

    #[test]
    fn solve_uses_hybrid_default_method() {
        let kernel = Kernel::new();
        let (m, b) = scenario_1();
        let options = Options {
            epsilon: 1e-8,
            ..Options::default()
        };
        let outcome = kernel.solve(&m, &b, &options).unwrap();
        assert!((outcome.solution[0] - 0.4).abs() < 1e-5);
    }

    #[test]
    fn non_dominant_matrix_is_rejected_without_override() {
        let kernel = Kernel::new();
        let m = SparseMatrix::from_coo(2, 2, &[0, 0, 1, 1], &[0, 1, 0, 1], &[1.0, 5.0, 5.0, 1.0])
            .unwrap();
        let b = vec![1.0, 1.0];
        let options = Options::default();
        let err = kernel.solve(&m, &b, &options).unwrap_err();
        assert!(matches!(err, KernelError::NotDiagonallyDominant { .. }));
    }

    #[test]
    fn session_busy_when_already_acquired() {
        let kernel = Kernel::new();
        let (m, b) = scenario_1();
        let options = Options {
            method: Method::Neumann,
            epsilon: 1e-8,
            ..Options::default()
        };
        let (id, _) = kernel.solve_session(m.clone(), &b, &options).unwrap();

        let sessions = kernel.sessions.lock().unwrap();
        let session = sessions.get(&id).unwrap();
        assert!(!session.is_closed());
    }

    #[test]
    fn solve_incremental_matches_direct_solve_with_same_combined_rhs() {
        let kernel = Kernel::new();
        let (m, b) = scenario_1();
        let options = Options {
            method: Method::Neumann,
            epsilon: 1e-10,
            ..Options::default()
        };
        let (id, _) = kernel.solve_session(m.clone(), &b, &options).unwrap();

        let delta = Delta::from_pairs([(0, 0.1), (1, -0.05)]);
        let incremental = kernel.solve_incremental(id, None, None, &delta).unwrap();

        let mut combined = b.clone();
        delta.apply_to(&mut combined);
        let direct = kernel.solve(&m, &combined, &options).unwrap();

        assert!((incremental.solution[0] - direct.solution[0]).abs() < 1e-8);
        assert!((incremental.solution[1] - direct.solution[1]).abs() < 1e-8);
    }

    #[test]
    fn cancel_stops_an_in_flight_session_before_next_incremental_call() {
        let kernel = Kernel::new();
        let (m, b) = scenario_1();
        let options = Options {
            method: Method::Neumann,
            epsilon: 1e-10,
            ..Options::default()
        };
        let (id, _) = kernel.solve_session(m.clone(), &b, &options).unwrap();
        kernel.cancel(id).unwrap();

        let delta = Delta::from_pairs([(0, 0.1)]);
        let err = kernel.solve_incremental(id, None, None, &delta).unwrap_err();
        assert!(matches!(err, KernelError::Cancelled { .. }));
    }
}
