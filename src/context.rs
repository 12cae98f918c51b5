//! Cancellation and timeout plumbing (spec §5, §9 "cancellation and
//! timeouts"): an explicit context passed into each iteration, not a
//! thread-local or exception-flow mechanism. Suspension points are the
//! iteration boundary only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative stop signal shared between a façade caller and the thread
/// driving an estimator. Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-call context: a deadline and a cancel flag, checked at the top of
/// every iteration. Deadline precision is coarser than one iteration;
/// termination may overshoot by at most one iteration (spec §5).
#[derive(Debug, Clone)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: CancelToken,
}

/// The two terminal conditions an iteration boundary check can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Cancelled,
    TimedOut,
}

impl Context {
    pub fn new() -> Self {
        Self {
            deadline: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            cancel: CancelToken::new(),
        }
    }

    /// Build a context sharing an existing cancel token — used by sessions
    /// so `facade::cancel` can reach a solve already in flight.
    pub fn with_cancel_token(cancel: CancelToken, timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|d| Instant::now() + d),
            cancel,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Checked once at the top of every iteration.
    pub fn check(&self) -> Option<StopSignal> {
        if self.cancel.is_cancelled() {
            return Some(StopSignal::Cancelled);
        }
        if let Some(d) = self.deadline {
            if Instant::now() >= d {
                return Some(StopSignal::TimedOut);
            }
        }
        None
    }

    pub fn elapsed_ns(&self, started_at: Instant) -> u64 {
        started_at.elapsed().as_nanos() as u64
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_no_stop_signal() {
        let ctx = Context::new();
        assert_eq!(ctx.check(), None);
    }

    #[test]
    fn cancel_is_observed_at_next_check() {
        let ctx = Context::new();
        ctx.cancel();
        assert_eq!(ctx.check(), Some(StopSignal::Cancelled));
    }

    #[test]
    fn cancel_token_shared_across_clones() {
        let ctx = Context::new();
        let token = ctx.cancel_token();
        token.cancel();
        assert_eq!(ctx.check(), Some(StopSignal::Cancelled));
    }

    #[test]
    fn expired_deadline_is_observed() {
        let ctx = Context::with_timeout(Duration::from_nanos(1));
        std::thread::sleep(Duration::from_millis(1));
        assert_eq!(ctx.check(), Some(StopSignal::TimedOut));
    }
}
