//! Session state (spec §3 "session", §9 "session ownership"): a session
//! exclusively owns its right-hand side and last outcome, and holds a
//! shared, read-only reference to its matrix. Modeled as a typed handle
//! into an arena indexed by session id, never as a shared mutable
//! singleton.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::context::CancelToken;
use crate::error::KernelError;
use crate::matrix::SparseMatrix;
use crate::solver::{Options, SolveOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// `(matrix_handle, b, options)` (spec §3); the active method lives on
/// `options.method`. `busy` guards against concurrent drivers on the same
/// session (spec §5: "concurrent calls against the same session fail with
/// `SessionBusy`").
pub struct Session {
    pub matrix: Arc<SparseMatrix>,
    /// The base right-hand side as mutated by successive `solve_incremental`
    /// deltas. Restart-from-this-b is the session's "estimator state": spec
    /// §4.4 notes restart is correct and bounds the state size, so the
    /// session need not carry each solver's low-level iteration state.
    pub b: Vec<f64>,
    pub last_outcome: Option<SolveOutcome>,
    pub options: Options,
    pub rng_seed: u64,
    pub cancel: CancelToken,
    busy: AtomicBool,
    closed: bool,
}

/// RAII guard returned by `Session::try_acquire`; releases the busy flag
/// on drop regardless of how the driving call terminates.
pub struct SessionGuard<'a> {
    session: &'a mut Session,
}

impl Session {
    pub fn new(matrix: Arc<SparseMatrix>, options: Options, rng_seed: u64) -> Self {
        Self {
            matrix,
            b: Vec::new(),
            last_outcome: None,
            options,
            rng_seed,
            cancel: CancelToken::new(),
            busy: AtomicBool::new(false),
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn try_acquire(&mut self) -> Result<SessionGuard<'_>, KernelError> {
        if self.closed {
            return Err(KernelError::SessionClosed);
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(KernelError::SessionBusy);
        }
        Ok(SessionGuard { session: self })
    }
}

impl std::ops::Deref for SessionGuard<'_> {
    type Target = Session;
    fn deref(&self) -> &Session {
        self.session
    }
}

impl std::ops::DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.session.busy.store(false, Ordering::Release);
    }
}
