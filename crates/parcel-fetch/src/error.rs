//! Error types for parcel-fetch.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::ResumeToken;

/// Connectivity failure classes. All of them are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    Timeout,
    Connect,
    Dns,
    Interrupted,
    Other,
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkKind::Timeout => write!(f, "timeout"),
            NetworkKind::Connect => write!(f, "connect"),
            NetworkKind::Dns => write!(f, "dns"),
            NetworkKind::Interrupted => write!(f, "interrupted"),
            NetworkKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network failure ({kind}): {message}")]
    Network { kind: NetworkKind, message: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("invalid resource URL: {0}")]
    InvalidUrl(String),

    #[error("download exceeds size limit: {observed} > {limit} bytes")]
    SizeLimit { observed: u64, limit: u64 },

    #[error("transport wrote {actual}, expected {expected}")]
    DestinationMismatch { expected: PathBuf, actual: PathBuf },

    #[error("size of completed download could not be determined")]
    MissingSize,

    #[error("file I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("transfer aborted by progress observer")]
    Aborted,

    #[error("download failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source:   Box<FetchError>,
    },
}

impl FetchError {
    pub fn network(kind: NetworkKind, message: impl Into<String>) -> Self {
        Self::Network {
            kind,
            message: message.into(),
        }
    }

    /// Only connectivity failures are retried; protocol, size and local I/O
    /// failures would fail the same way again.
    pub fn is_retryable(&self) -> bool { matches!(self, FetchError::Network { .. }) }

    pub fn is_size_violation(&self) -> bool {
        matches!(
            self,
            FetchError::SizeLimit { .. } | FetchError::MissingSize | FetchError::DestinationMismatch { .. }
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::RetriesExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(e: io::Error) -> Self { FetchError::Io(e) }
}

/// A failed transport call, optionally carrying what is needed to continue
/// from the bytes already on disk.
#[derive(Debug)]
pub struct TransferFailure {
    pub error:  FetchError,
    pub resume: Option<ResumeToken>,
}

impl TransferFailure {
    pub fn fatal(error: FetchError) -> Self { Self { error, resume: None } }

    pub fn resumable(error: FetchError, token: ResumeToken) -> Self {
        Self {
            error,
            resume: Some(token),
        }
    }
}

impl From<FetchError> for TransferFailure {
    fn from(error: FetchError) -> Self { Self::fatal(error) }
}

impl From<io::Error> for TransferFailure {
    fn from(e: io::Error) -> Self { Self::fatal(FetchError::Io(e)) }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resume {
            Some(token) => write!(f, "{} (resumable at byte {})", self.error, token.offset()),
            None => write!(f, "{}", self.error),
        }
    }
}
