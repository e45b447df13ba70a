//! Data layer: requests, resume tokens, progress ticks and retry policy.

mod policy;
mod progress;
mod request;

pub use policy::{
    Backoff, MAX_ATTEMPTS, MAX_DOWNLOAD_SIZE, PROGRESS_EPSILON, RETRY_BACKOFF, RetryPolicy,
    SUSPICIOUS_ID_CEILING,
};
pub use progress::{Flow, ProgressFn, TransferProgress};
pub use request::{DownloadRequest, ResumeToken};
