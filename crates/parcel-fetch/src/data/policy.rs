use std::time::Duration;

use crate::core::retry_delay;

/// Hard ceiling on any attachment download. Not configurable per call.
pub const MAX_DOWNLOAD_SIZE: u64 = 150 * 1024 * 1024;

/// Retries allowed after the initial attempt.
pub const MAX_ATTEMPTS: u32 = 16;

pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Smallest fraction forwarded once bytes are flowing.
pub const PROGRESS_EPSILON: f64 = 0.001;

/// Numeric remote keys below this are logged when a download fails fatally.
pub const SUSPICIOUS_ID_CEILING: u64 = 100;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base * 2^retry`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the attempt with index `attempt` failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(delay) => *delay,
            Backoff::Exponential { base, max } => retry_delay(attempt, *base).min(*max),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self { Backoff::Fixed(RETRY_BACKOFF) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the initial attempt; total attempts is one more.
    pub max_attempts: u32,
    pub backoff:      Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff:      Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn allows_retry_after(&self, attempt: u32) -> bool { attempt < self.max_attempts }
}
