use std::path::PathBuf;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::{SizeGuard, validate_completed};
use crate::data::{DownloadRequest, ResumeToken, RetryPolicy, SUSPICIOUS_ID_CEILING, TransferProgress};
use crate::effects::Transport;
use crate::error::{FetchError, TransferFailure};

/// Drives a [`Transport`] until the ciphertext is complete or a terminal
/// failure is reached.
///
/// Attempts for one request are strictly sequential. A retryable failure
/// waits out the backoff and, when the transport handed back a
/// [`ResumeToken`], continues from the bytes already on disk; otherwise the
/// next attempt starts again from zero.
pub struct AttemptController<'t, T: Transport> {
    transport: &'t T,
    policy:    RetryPolicy,
}

impl<'t, T: Transport> AttemptController<'t, T> {
    pub fn new(transport: &'t T, policy: RetryPolicy) -> Self { Self { transport, policy } }

    pub fn policy(&self) -> &RetryPolicy { &self.policy }

    /// Run attempts starting at index 0 with no resume token.
    pub async fn run(&self, request: &DownloadRequest, guard: &SizeGuard<'_>) -> Result<PathBuf, FetchError> {
        let mut resume: Option<ResumeToken> = None;
        let mut attempt: u32 = 0;

        loop {
            let failure = match self.attempt(request, resume.take(), attempt, guard).await {
                Ok(path) => return Ok(path),
                Err(failure) => failure,
            };
            let TransferFailure { error, resume: token } = failure;

            if !error.is_retryable() {
                self.report_fatal(request, &error);
                return Err(error);
            }

            if !self.policy.allows_retry_after(attempt) {
                let error = FetchError::RetriesExhausted {
                    attempts: attempt + 1,
                    source:   Box::new(error),
                };
                self.report_fatal(request, &error);
                return Err(error);
            }

            let delay = self.policy.backoff.delay(attempt);
            info!(
                url = %request.url,
                attempt,
                resume_offset = token.as_ref().map(ResumeToken::offset),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "download attempt failed, retrying"
            );
            sleep(delay).await;

            resume = token;
            attempt += 1;
        }
    }

    /// One transport call plus validation of its result.
    ///
    /// A size violation recorded by the guard takes precedence over whatever
    /// the transport reported, so an abort surfaces as
    /// [`FetchError::SizeLimit`].
    pub async fn attempt(
        &self,
        request: &DownloadRequest,
        resume: Option<ResumeToken>,
        attempt: u32,
        guard: &SizeGuard<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        let on_progress = |progress: TransferProgress| guard.observe(progress);

        let outcome = match resume {
            Some(token) => {
                debug!(url = %request.url, attempt, offset = token.offset(), "resuming download");
                self.transport.resume(token, &request.destination, &on_progress).await
            }
            None => {
                debug!(url = %request.url, attempt, "starting download");
                self.transport.download(request, &on_progress).await
            }
        };

        if let Some(violation) = guard.violation() {
            return Err(TransferFailure::fatal(violation));
        }

        let completed = outcome?;
        let len = validate_completed(&request.destination, &completed)?;
        debug!(url = %request.url, attempt, bytes = len, "download complete");
        Ok(completed)
    }

    fn report_fatal(&self, request: &DownloadRequest, error: &FetchError) {
        if let Ok(id) = request.remote_key.parse::<u64>()
            && id < SUSPICIOUS_ID_CEILING
        {
            warn!(
                remote_key = id,
                error = %error,
                "download failed for suspicious low resource id"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkKind;
    use crate::testing::{ScriptedTransport, Step, TransportCall};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    fn setup() -> (TempDir, DownloadRequest) {
        let dir = TempDir::new().unwrap();
        let url = Url::parse("https://cdn.example/attachments/4242").unwrap();
        let request = DownloadRequest::new(url, dir.path().join("cipher.part")).remote_key("4242");
        (dir, request)
    }

    fn quick() -> RetryPolicy { RetryPolicy::default().backoff(crate::Backoff::Fixed(Duration::ZERO)) }

    fn guard() -> SizeGuard<'static> { SizeGuard::new(None, |_| {}) }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let (_dir, request) = setup();
        let transport = ScriptedTransport::new(vec![Step::deliver(b"ciphertext".to_vec())]);
        let controller = AttemptController::new(&transport, quick());

        let path = controller.run(&request, &guard()).await.unwrap();
        assert_eq!(path, request.destination);
        assert_eq!(std::fs::read(&path).unwrap(), b"ciphertext");
        assert_eq!(transport.calls(), vec![TransportCall::Download { url: request.url.clone() }]);
    }

    #[tokio::test]
    async fn test_timeout_then_resume_with_token() {
        let (_dir, request) = setup();
        let body = vec![9u8; 100];
        let transport = ScriptedTransport::new(vec![
            Step::interrupt(body.clone(), 40, NetworkKind::Timeout, true),
            Step::deliver(body.clone()),
        ]);
        let controller = AttemptController::new(&transport, quick());

        let path = controller.run(&request, &guard()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Download { url: request.url.clone() },
                TransportCall::Resume { offset: 40 },
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_without_token_restarts_from_zero() {
        let (_dir, request) = setup();
        let body = vec![1u8; 64];
        let transport = ScriptedTransport::new(vec![
            Step::interrupt(body.clone(), 32, NetworkKind::Interrupted, false),
            Step::deliver(body.clone()),
        ]);
        let controller = AttemptController::new(&transport, quick());

        let path = controller.run(&request, &guard()).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), body);
        assert_eq!(transport.calls().len(), 2);
        assert!(matches!(transport.calls()[1], TransportCall::Download { .. }));
    }

    #[tokio::test]
    async fn test_protocol_error_is_not_retried() {
        let (_dir, request) = setup();
        let transport = ScriptedTransport::new(vec![
            Step::fail(FetchError::Http { status: 404, url: request.url.to_string() }),
            Step::deliver(b"never".to_vec()),
        ]);
        let controller = AttemptController::new(&transport, quick());

        let err = controller.run(&request, &guard()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_low_resource_id_failure_keeps_control_flow() {
        let (dir, _) = setup();
        let url = Url::parse("https://cdn.example/attachments/7").unwrap();
        let request = DownloadRequest::new(url.clone(), dir.path().join("cipher.part")).remote_key("7");
        let transport = ScriptedTransport::new(vec![
            Step::fail(FetchError::Http { status: 404, url: url.to_string() }),
            Step::deliver(b"never".to_vec()),
        ]);
        let controller = AttemptController::new(&transport, quick());

        let err = controller.run(&request, &guard()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(transport.calls(), vec![TransportCall::Download { url }]);
        assert_eq!(transport.remaining(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_ceiling() {
        let (_dir, request) = setup();
        let steps = (0..=16)
            .map(|_| Step::fail(FetchError::network(NetworkKind::Connect, "refused")))
            .chain(std::iter::once(Step::deliver(b"too late".to_vec())))
            .collect();
        let transport = ScriptedTransport::new(steps);
        let controller = AttemptController::new(&transport, quick());

        let err = controller.run(&request, &guard()).await.unwrap_err();
        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 17, .. }));
        assert_eq!(transport.calls().len(), 17);
    }

    #[tokio::test]
    async fn test_size_violation_wins_over_transport_result() {
        let (_dir, request) = setup();
        let transport = ScriptedTransport::new(vec![
            Step::deliver(vec![0u8; 16]).declared_total(200 * 1024 * 1024),
        ]);
        let controller = AttemptController::new(&transport, quick());

        let err = controller.run(&request, &guard()).await.unwrap_err();
        assert!(matches!(err, FetchError::SizeLimit { .. }));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_destination_mismatch_is_fatal() {
        let (dir, request) = setup();
        let transport = ScriptedTransport::new(vec![Step::deliver(b"x".to_vec()).misplace(dir.path().join("elsewhere"))]);
        let controller = AttemptController::new(&transport, quick());

        let err = controller.run(&request, &guard()).await.unwrap_err();
        assert!(matches!(err, FetchError::DestinationMismatch { .. }));
    }

    #[tokio::test]
    async fn test_progress_reaches_sink_across_attempts() {
        let (_dir, request) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let guard = SizeGuard::new(Some(100), move |f| sink.lock().unwrap().push(f));
        let body = vec![5u8; 100];
        let transport = ScriptedTransport::new(vec![
            Step::interrupt(body.clone(), 50, NetworkKind::Timeout, false),
            Step::deliver(body),
        ])
        .chunk_size(25);
        let controller = AttemptController::new(&transport, quick());

        controller.run(&request, &guard).await.unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![0.25, 0.5, 0.5, 0.75, 1.0]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
