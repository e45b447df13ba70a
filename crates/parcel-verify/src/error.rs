#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("digest mismatch ({expected_len}-byte expected, {actual_len}-byte actual)")]
    Mismatch {
        expected_len: usize,
        actual_len:   usize,
    },

    #[error("invalid MAC key length: {0}")]
    InvalidKeyLength(usize),
}

pub type Result<T> = std::result::Result<T, VerificationError>;
