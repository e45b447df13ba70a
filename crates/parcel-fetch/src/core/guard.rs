use std::sync::Mutex;

use tracing::warn;

use crate::data::{Flow, MAX_DOWNLOAD_SIZE, PROGRESS_EPSILON, TransferProgress};
use crate::error::FetchError;

type FractionSink<'a> = Box<dyn Fn(f64) + Send + Sync + 'a>;

#[derive(Debug, Default)]
struct GuardState {
    high_water: f64,
    violation:  Option<(u64, u64)>,
}

/// Inline progress filter shared by every attempt of one download.
///
/// Aborts the in-flight transfer the moment either the declared total or the
/// bytes received exceed [`MAX_DOWNLOAD_SIZE`], and forwards a normalized,
/// never-decreasing fraction to its sink on every accepted tick.
pub struct SizeGuard<'a> {
    limit:    u64,
    declared: Option<u64>,
    state:    Mutex<GuardState>,
    sink:     FractionSink<'a>,
}

impl<'a> SizeGuard<'a> {
    /// `declared` is the size estimate carried by the pointer; it stands in
    /// for the total when the server does not announce one.
    pub fn new(declared: Option<u64>, sink: impl Fn(f64) + Send + Sync + 'a) -> Self {
        Self {
            limit: MAX_DOWNLOAD_SIZE,
            declared: declared.filter(|d| *d > 0),
            state: Mutex::new(GuardState::default()),
            sink: Box::new(sink),
        }
    }

    pub fn limit(&self) -> u64 { self.limit }

    pub fn observe(&self, progress: TransferProgress) -> Flow {
        if progress.received == 0 {
            return Flow::Continue;
        }

        let observed = progress.total.unwrap_or(0).max(progress.received);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.violation.is_some() {
            return Flow::Abort;
        }

        if observed > self.limit {
            warn!(
                received = progress.received,
                total = ?progress.total,
                limit = self.limit,
                "download exceeds size limit, aborting transfer"
            );
            state.violation = Some((observed, self.limit));
            return Flow::Abort;
        }

        let fraction = self.fraction(progress);
        if fraction < state.high_water {
            return Flow::Continue;
        }
        state.high_water = fraction;
        drop(state);

        (self.sink)(fraction);
        Flow::Continue
    }

    /// The size violation that caused an abort, if any.
    pub fn violation(&self) -> Option<FetchError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.violation.map(|(observed, limit)| FetchError::SizeLimit { observed, limit })
    }

    /// Highest fraction forwarded so far.
    pub fn high_water(&self) -> f64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).high_water
    }

    fn fraction(&self, progress: TransferProgress) -> f64 {
        let total = progress.total.filter(|t| *t > 0).or(self.declared);
        let raw = match total {
            Some(total) => progress.received as f64 / total as f64,
            None => 0.0,
        };
        raw.clamp(PROGRESS_EPSILON, 1.0)
    }
}

impl std::fmt::Debug for SizeGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SizeGuard")
            .field("limit", &self.limit)
            .field("declared", &self.declared)
            .finish_non_exhaustive()
    }
}
