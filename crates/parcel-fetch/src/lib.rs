//! Size-bounded, resumable attachment downloads.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - requests, resume tokens, progress ticks and retry policy
//! - `core` - pure decisions: backoff, the [`SizeGuard`], completion checks
//! - `effects` - the [`Transport`] abstraction and the [`AttemptController`]
//!
//! # Key Features
//!
//! - **Hard ceiling**: [`MAX_DOWNLOAD_SIZE`] is enforced mid-stream against
//!   both the announced length and the bytes actually received
//! - **Resumable retries**: connectivity failures are retried up to
//!   [`MAX_ATTEMPTS`] times, continuing from a [`ResumeToken`] when the
//!   transport provides one
//! - **Injectable transport**: retry policy never touches sockets directly,
//!   so failures can be scripted in tests

mod core;
mod data;
mod effects;
mod error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use crate::core::{SizeGuard, retry_delay, validate_completed};
pub use data::{
    Backoff, DownloadRequest, Flow, MAX_ATTEMPTS, MAX_DOWNLOAD_SIZE, PROGRESS_EPSILON, ProgressFn,
    RETRY_BACKOFF, ResumeToken, RetryPolicy, SUSPICIOUS_ID_CEILING, TransferProgress,
};
pub use effects::{AttemptController, Transport};

#[cfg(feature = "reqwest")]
pub use effects::{ReqwestTransport, TransportConfig};

pub use error::{FetchError, NetworkKind, TransferFailure};
