//! Process liveness tokens held for the duration of a retrieval.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

/// Keeps the host environment from suspending the process while held.
///
/// `hold` and `release` are always called in pairs by [`KeepAliveGuard`].
pub trait KeepAlive: Send + Sync {
    fn hold(&self, reason: &str);
    fn release(&self, reason: &str);
}

/// Scoped liveness token; released on drop, including when the owning future
/// is cancelled.
#[must_use = "the keep-alive is released as soon as the guard is dropped"]
pub struct KeepAliveGuard {
    keep_alive: Arc<dyn KeepAlive>,
    reason:     String,
}

impl KeepAliveGuard {
    pub fn acquire(keep_alive: Arc<dyn KeepAlive>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        keep_alive.hold(&reason);
        trace!(reason = %reason, "keep-alive acquired");
        Self { keep_alive, reason }
    }
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        self.keep_alive.release(&self.reason);
        trace!(reason = %self.reason, "keep-alive released");
    }
}

impl fmt::Debug for KeepAliveGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeepAliveGuard").field("reason", &self.reason).finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeepAlive;

impl KeepAlive for NoopKeepAlive {
    fn hold(&self, _reason: &str) {}
    fn release(&self, _reason: &str) {}
}

/// Counts outstanding and total holds.
#[derive(Debug, Default)]
pub struct CountingKeepAlive {
    held:  AtomicUsize,
    total: AtomicUsize,
}

impl CountingKeepAlive {
    pub fn new() -> Self { Self::default() }

    pub fn held(&self) -> usize { self.held.load(Ordering::Acquire) }

    pub fn total(&self) -> usize { self.total.load(Ordering::Acquire) }
}

impl KeepAlive for CountingKeepAlive {
    fn hold(&self, _reason: &str) {
        self.held.fetch_add(1, Ordering::AcqRel);
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&self, _reason: &str) { self.held.fetch_sub(1, Ordering::AcqRel); }
}
