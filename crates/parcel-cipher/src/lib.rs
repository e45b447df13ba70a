//! Decrypt-and-verify primitive for attachment ciphertext.
//!
//! The pipeline only depends on [`AttachmentCipher`]; [`SealedBlobCipher`] is
//! the concrete scheme used on the wire, and [`seal`] is its inverse for
//! producing fixtures and uploads.

mod error;
mod sealed;

pub use error::{CipherError, Result};
pub use sealed::{
    IV_LEN, KEY_MATERIAL_LEN, MAC_LEN, SealedBlob, SealedBlobCipher, generate_iv,
    generate_key_material, padded_size, seal,
};

/// Opens a downloaded ciphertext into verified plaintext.
///
/// Implementations must check `digest` against the ciphertext before
/// returning any plaintext, and honour `unpadded_size` when present.
pub trait AttachmentCipher: Send + Sync {
    fn open(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        digest: &[u8],
        unpadded_size: Option<u64>,
    ) -> Result<Vec<u8>>;
}

impl<C: AttachmentCipher + ?Sized> AttachmentCipher for std::sync::Arc<C> {
    fn open(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        digest: &[u8],
        unpadded_size: Option<u64>,
    ) -> Result<Vec<u8>> {
        (**self).open(ciphertext, key, digest, unpadded_size)
    }
}
