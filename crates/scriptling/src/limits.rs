//! Execution limits: cooperative cancellation, deadlines, and call depth.
//!
//! The evaluator consults these at its two suspension points — before each
//! statement and on each function-call entry — plus inside cooperating
//! builtins such as `time.sleep`. There is no preemption; a fired token is
//! observed at the next check.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::exception::{ExcType, Exception};

/// Default maximum call depth, matching CPython's recursion limit.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// A shared flag the host fires to cancel a running script.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the token. Execution stops at the next suspension point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-invocation execution limits.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Maximum call depth; overflow raises `RecursionError`.
    pub max_depth: usize,
    /// Absolute deadline; elapsing yields a `timeout` exception.
    pub deadline: Option<Instant>,
    /// Explicit cancellation; firing yields a `cancelled` exception.
    pub cancel: Option<CancelToken>,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_CALL_DEPTH,
            deadline: None,
            cancel: None,
        }
    }
}

impl RunLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Convenience: deadline relative to now.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The statement-boundary check: explicit cancel wins over deadline.
    pub fn check_interrupt(&self) -> Result<(), Exception> {
        if let Some(token) = &self.cancel
            && token.is_cancelled()
        {
            return Err(Exception::new(ExcType::Exception, "cancelled"));
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(Exception::new(ExcType::Exception, "timeout"));
        }
        Ok(())
    }

    /// The function-entry check; `depth` is the depth before the new frame.
    pub fn check_depth(&self, depth: usize) -> Result<(), Exception> {
        if depth >= self.max_depth {
            return Err(Exception::new(
                ExcType::RecursionError,
                format!("call depth exceeded (max {})", self.max_depth),
            ));
        }
        Ok(())
    }

    /// Remaining time before the deadline, for blocking builtins that need
    /// to sleep in bounded slices.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_depth_is_one_thousand() {
        let limits = RunLimits::default();
        assert!(limits.check_depth(999).is_ok());
        let err = limits.check_depth(1000).unwrap_err();
        assert!(err.to_string().contains("call depth exceeded"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn cancel_reports_cancelled() {
        let token = CancelToken::new();
        let limits = RunLimits::new().cancel_token(token.clone());
        assert!(limits.check_interrupt().is_ok());
        token.cancel();
        let err = limits.check_interrupt().unwrap_err();
        assert_eq!(err.message.as_deref(), Some("cancelled"));
    }

    #[test]
    fn elapsed_deadline_reports_timeout() {
        let limits = RunLimits::new().deadline(Instant::now() - Duration::from_millis(1));
        let err = limits.check_interrupt().unwrap_err();
        assert_eq!(err.message.as_deref(), Some("timeout"));
    }

    #[test]
    fn explicit_cancel_wins_over_deadline() {
        let token = CancelToken::new();
        token.cancel();
        let limits = RunLimits::new()
            .cancel_token(token)
            .deadline(Instant::now() - Duration::from_millis(1));
        let err = limits.check_interrupt().unwrap_err();
        assert_eq!(err.message.as_deref(), Some("cancelled"));
    }
}
