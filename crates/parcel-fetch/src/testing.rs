//! Deterministic transport for exercising retry, resume and size handling
//! without sockets.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::io::AsyncWriteExt;
use url::Url;

use crate::data::{DownloadRequest, Flow, ProgressFn, ResumeToken, TransferProgress};
use crate::effects::Transport;
use crate::error::{FetchError, NetworkKind, TransferFailure};

const DEFAULT_CHUNK: usize = 8 * 1024;

/// What the scripted server does on the next call.
#[derive(Debug)]
pub enum Step {
    /// Serve `body` to completion (from the token offset on resume).
    Deliver {
        body:           Vec<u8>,
        declared_total: Option<u64>,
        misplace:       Option<PathBuf>,
    },
    /// Serve `body` up to byte `until`, then drop the connection.
    Interrupt {
        body:      Vec<u8>,
        until:     usize,
        kind:      NetworkKind,
        resumable: bool,
    },
    /// Fail before any byte is written.
    Fail(FetchError),
}

impl Step {
    pub fn deliver(body: Vec<u8>) -> Self {
        Step::Deliver {
            body,
            declared_total: None,
            misplace: None,
        }
    }

    pub fn interrupt(body: Vec<u8>, until: usize, kind: NetworkKind, resumable: bool) -> Self {
        Step::Interrupt {
            body,
            until,
            kind,
            resumable,
        }
    }

    pub fn fail(error: FetchError) -> Self { Step::Fail(error) }

    /// Announce `total` instead of the real body length.
    pub fn declared_total(self, total: u64) -> Self {
        match self {
            Step::Deliver { body, misplace, .. } => Step::Deliver {
                body,
                declared_total: Some(total),
                misplace,
            },
            other => other,
        }
    }

    /// Report success at `path` instead of the requested destination.
    pub fn misplace(self, path: PathBuf) -> Self {
        match self {
            Step::Deliver {
                body, declared_total, ..
            } => Step::Deliver {
                body,
                declared_total,
                misplace: Some(path),
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Download { url: Url },
    Resume { offset: u64 },
}

/// Plays back a fixed list of [`Step`]s, one per call.
#[derive(Debug)]
pub struct ScriptedTransport {
    steps:      Mutex<VecDeque<Step>>,
    calls:      Mutex<Vec<TransportCall>>,
    chunk_size: usize,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps:      Mutex::new(steps.into()),
            calls:      Mutex::new(Vec::new()),
            chunk_size: DEFAULT_CHUNK,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> { self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone() }

    pub fn remaining(&self) -> usize { self.steps.lock().unwrap_or_else(|e| e.into_inner()).len() }

    fn next_step(&self) -> Option<Step> { self.steps.lock().unwrap_or_else(|e| e.into_inner()).pop_front() }

    fn record(&self, call: TransportCall) { self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call); }

    async fn play(
        &self,
        url: &Url,
        headers: &[(String, String)],
        destination: &Path,
        offset: u64,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        let step = self
            .next_step()
            .ok_or_else(|| FetchError::network(NetworkKind::Other, "script exhausted"))?;

        let mut file = if offset == 0 {
            tokio::fs::File::create(destination).await?
        } else {
            tokio::fs::OpenOptions::new().append(true).open(destination).await?
        };

        match step {
            Step::Fail(error) => Err(TransferFailure::fatal(error)),
            Step::Deliver {
                body,
                declared_total,
                misplace,
            } => {
                let total = declared_total.unwrap_or(body.len() as u64);
                self.pump(&mut file, &body, offset as usize, body.len(), total, on_progress)
                    .await?;
                file.flush().await?;
                match misplace {
                    Some(path) => {
                        drop(file);
                        tokio::fs::copy(destination, &path).await?;
                        Ok(path)
                    }
                    None => Ok(destination.to_path_buf()),
                }
            }
            Step::Interrupt {
                body,
                until,
                kind,
                resumable,
            } => {
                let until = until.min(body.len());
                self.pump(&mut file, &body, offset as usize, until, body.len() as u64, on_progress)
                    .await?;
                file.flush().await?;
                let error = FetchError::network(kind, "scripted connection drop");
                if resumable && until > 0 {
                    let token = ResumeToken::new(url.clone(), headers.to_vec(), until as u64, None);
                    Err(TransferFailure::resumable(error, token))
                } else {
                    Err(TransferFailure::fatal(error))
                }
            }
        }
    }

    async fn pump(
        &self,
        file: &mut tokio::fs::File,
        body: &[u8],
        from: usize,
        until: usize,
        total: u64,
        on_progress: ProgressFn<'_>,
    ) -> Result<(), TransferFailure> {
        let mut position = from.min(until);
        while position < until {
            let end = (position + self.chunk_size).min(until);
            file.write_all(&body[position..end]).await?;
            position = end;
            if on_progress(TransferProgress::new(position as u64, Some(total))) == Flow::Abort {
                return Err(TransferFailure::fatal(FetchError::Aborted));
            }
        }
        Ok(())
    }
}

impl Transport for ScriptedTransport {
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        self.record(TransportCall::Download {
            url: request.url.clone(),
        });
        self.play(&request.url, &request.headers, &request.destination, 0, on_progress)
            .await
    }

    async fn resume(
        &self,
        token: ResumeToken,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<PathBuf, TransferFailure> {
        self.record(TransportCall::Resume { offset: token.offset() });
        self.play(token.url(), token.headers(), destination, token.offset(), on_progress)
            .await
    }
}
