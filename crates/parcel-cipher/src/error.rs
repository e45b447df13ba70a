use thiserror::Error;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key material length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("attachment pointer carries no digest")]
    MissingDigest,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("ciphertext digest does not match pointer")]
    DigestMismatch,

    #[error("ciphertext MAC does not verify")]
    MacMismatch,

    #[error("AES-256-CBC decryption failed: {0}")]
    Decrypt(String),

    #[error("plaintext size mismatch: declared {declared}, decrypted {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("random source unavailable: {0}")]
    Random(String),
}

pub type Result<T> = std::result::Result<T, CipherError>;
