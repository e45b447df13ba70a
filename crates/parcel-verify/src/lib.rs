//! Digest and MAC verification for attachment ciphertext.
//!
//! Hashers are incremental so callers can feed data as it arrives; the final
//! comparison is constant-time so a mismatch leaks nothing about how many
//! leading bytes matched.
//!
//! # Example
//!
//! ```
//! use parcel_verify::{Hasher, Sha256Hasher, verify};
//!
//! let expected = Sha256Hasher::digest(b"hello world");
//!
//! let mut hasher = Sha256Hasher::new();
//! hasher.update(b"hello ");
//! hasher.update(b"world");
//! verify(&expected, &hasher.finalize()).unwrap();
//! ```

pub use self::error::{Result, VerificationError};
pub use self::hasher::{Hasher, HmacSha256Hasher, Sha256Hasher};

mod error;
mod hasher;

use subtle::ConstantTimeEq;

/// Compare two digests without short-circuiting on the first differing byte.
pub fn verify(expected: &[u8], actual: &[u8]) -> Result<()> {
    if expected.len() == actual.len() && bool::from(expected.ct_eq(actual)) {
        Ok(())
    } else {
        Err(VerificationError::Mismatch {
            expected_len: expected.len(),
            actual_len:   actual.len(),
        })
    }
}
