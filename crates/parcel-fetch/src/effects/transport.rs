use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data::{DownloadRequest, ProgressFn, ResumeToken};
use crate::error::TransferFailure;

/// Resumable GET into a destination file.
///
/// Implementations call `on_progress` at every chunk boundary with the total
/// bytes persisted so far and must stop as soon as it returns
/// [`Flow::Abort`](crate::Flow::Abort). On success they return the path they
/// wrote, which the caller checks against the one requested.
///
/// # Implementations
///
/// - [`ReqwestTransport`](crate::ReqwestTransport): HTTP via `reqwest`
/// - [`ScriptedTransport`](crate::testing::ScriptedTransport): deterministic
///   failures and resume tokens for tests
pub trait Transport: Send + Sync {
    /// Fetch the whole resource, truncating whatever is at the destination.
    fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressFn<'_>,
    ) -> impl Future<Output = Result<PathBuf, TransferFailure>> + Send;

    /// Continue a partial transfer from the token's offset, appending to the
    /// destination.
    fn resume(
        &self,
        token: ResumeToken,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> impl Future<Output = Result<PathBuf, TransferFailure>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressFn<'_>,
    ) -> impl Future<Output = Result<PathBuf, TransferFailure>> + Send {
        (**self).download(request, on_progress)
    }

    fn resume(
        &self,
        token: ResumeToken,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> impl Future<Output = Result<PathBuf, TransferFailure>> + Send {
        (**self).resume(token, destination, on_progress)
    }
}
