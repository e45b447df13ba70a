//! Error types for the attachment pipeline.

use std::io;

use parcel_cipher::CipherError;
use parcel_fetch::FetchError;
use thiserror::Error;

use crate::store::StoreError;

/// Failures of the decrypt stage. None of them are retried.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("attachment pointer carries no decryption key")]
    MissingKey,

    #[error("decrypt-and-verify failed: {0}")]
    Cipher(#[from] CipherError),

    #[error("failed to read ciphertext: {0}")]
    Read(#[source] io::Error),

    #[error("failed to store plaintext: {0}")]
    Store(#[from] StoreError),

    #[error("decrypt worker failed: {0}")]
    Worker(String),

    #[error("decrypt pool is closed")]
    PoolClosed,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("download failed: {0}")]
    Download(#[from] FetchError),

    #[error("decrypt failed: {0}")]
    Decrypt(#[from] DecryptError),

    #[error("scratch file error: {0}")]
    Scratch(#[from] parcel_fs::Error),
}

impl PipelineError {
    /// The ciphertext or pointer is unusable; fetching again will not help.
    pub fn is_bad_data(&self) -> bool {
        match self {
            PipelineError::Decrypt(e) => !matches!(e, DecryptError::Worker(_) | DecryptError::PoolClosed),
            PipelineError::Download(e) => e.is_size_violation(),
            PipelineError::Scratch(_) => false,
        }
    }

    /// Connectivity to the CDN failed, possibly after exhausting retries.
    pub fn is_bad_network(&self) -> bool {
        match self {
            PipelineError::Download(FetchError::RetriesExhausted { .. }) => true,
            PipelineError::Download(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_fetch::NetworkKind;

    #[test]
    fn test_decrypt_failures_are_bad_data() {
        assert!(PipelineError::from(DecryptError::MissingKey).is_bad_data());
        assert!(PipelineError::from(DecryptError::Cipher(CipherError::DigestMismatch)).is_bad_data());
        assert!(!PipelineError::from(DecryptError::MissingKey).is_bad_network());
        assert!(!PipelineError::from(DecryptError::PoolClosed).is_bad_data());
    }

    #[test]
    fn test_exhausted_retries_are_bad_network() {
        let error = PipelineError::from(FetchError::RetriesExhausted {
            attempts: 17,
            source:   Box::new(FetchError::network(NetworkKind::Timeout, "slow")),
        });
        assert!(error.is_bad_network());
        assert!(!error.is_bad_data());
    }

    #[test]
    fn test_size_violation_is_bad_data() {
        let error = PipelineError::from(FetchError::SizeLimit { observed: 2, limit: 1 });
        assert!(error.is_bad_data());
        assert!(!error.is_bad_network());
    }
}
