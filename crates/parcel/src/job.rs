use std::sync::atomic::{AtomicU64, Ordering};

use crate::pointer::AttachmentId;

/// Scheduler-owned handle for one retrieval; exposes its latest progress.
#[derive(Debug)]
pub struct DownloadJob {
    id:       AttachmentId,
    progress: AtomicU64,
}

impl DownloadJob {
    pub fn new(id: impl Into<AttachmentId>) -> Self {
        Self {
            id:       id.into(),
            progress: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn id(&self) -> &AttachmentId { &self.id }

    /// Record a fraction, clamped to `[0, 1]`.
    pub fn set_progress(&self, fraction: f64) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.progress.store(fraction.to_bits(), Ordering::Release);
    }

    pub fn progress(&self) -> f64 { f64::from_bits(self.progress.load(Ordering::Acquire)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_starts_at_zero() {
        assert_eq!(DownloadJob::new("a").progress(), 0.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let job = DownloadJob::new("a");
        job.set_progress(0.4);
        assert_eq!(job.progress(), 0.4);
        job.set_progress(3.0);
        assert_eq!(job.progress(), 1.0);
        job.set_progress(f64::NAN);
        assert_eq!(job.progress(), 0.0);
    }
}
