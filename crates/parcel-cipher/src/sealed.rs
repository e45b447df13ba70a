#![forbid(unsafe_code)]

//! AES-256-CBC + HMAC-SHA256 sealed blobs.
//!
//! Layout: `IV (16) || CBC body, PKCS7 padded || MAC (32)`. The MAC covers
//! `IV || body`; the digest carried by the pointer is SHA-256 over the whole
//! blob. Plaintext is zero-padded to a bucket size before encryption so the
//! blob length only leaks the bucket.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use parcel_verify::{HmacSha256Hasher, Sha256Hasher, verify};
use tracing::trace;

use crate::error::{CipherError, Result};
use crate::AttachmentCipher;

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

pub const AES_KEY_LEN: usize = 32;
pub const MAC_KEY_LEN: usize = 32;
/// Combined key material carried by an attachment pointer.
pub const KEY_MATERIAL_LEN: usize = AES_KEY_LEN + MAC_KEY_LEN;
pub const IV_LEN: usize = 16;
pub const MAC_LEN: usize = 32;
const BLOCK_LEN: usize = 16;
const MIN_PADDED_SIZE: usize = 541;

/// Bucketed plaintext size a sender pads to before sealing.
pub fn padded_size(len: usize) -> usize {
    if len == 0 {
        return MIN_PADDED_SIZE;
    }
    let exponent = ((len as f64).ln() / 1.05_f64.ln()).ceil();
    let bucket = 1.05_f64.powf(exponent).floor() as usize;
    bucket.max(MIN_PADDED_SIZE).max(len)
}

/// Output of [`seal`].
#[derive(Debug, Clone)]
pub struct SealedBlob {
    pub blob:          Vec<u8>,
    pub digest:        Vec<u8>,
    pub unpadded_size: u64,
}

pub fn generate_key_material() -> Result<[u8; KEY_MATERIAL_LEN]> {
    let mut key = [0u8; KEY_MATERIAL_LEN];
    getrandom::fill(&mut key).map_err(|e| CipherError::Random(e.to_string()))?;
    Ok(key)
}

pub fn generate_iv() -> Result<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    getrandom::fill(&mut iv).map_err(|e| CipherError::Random(e.to_string()))?;
    Ok(iv)
}

fn split_key(key: &[u8]) -> Result<(&[u8], &[u8])> {
    if key.len() != KEY_MATERIAL_LEN {
        return Err(CipherError::InvalidKeyLength {
            expected: KEY_MATERIAL_LEN,
            actual:   key.len(),
        });
    }
    Ok(key.split_at(AES_KEY_LEN))
}

/// Encrypt `plaintext`, zero-padding it to `pad_to` bytes first when that is
/// larger than the plaintext.
pub fn seal(plaintext: &[u8], key: &[u8], iv: &[u8; IV_LEN], pad_to: usize) -> Result<SealedBlob> {
    let (aes_key, mac_key) = split_key(key)?;

    let padded_len = pad_to.max(plaintext.len());
    let cbc_len = padded_len + (BLOCK_LEN - padded_len % BLOCK_LEN);
    let mut buf = vec![0u8; cbc_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);

    let body = Aes256CbcEnc::new_from_slices(aes_key, iv)
        .map_err(|e| CipherError::Decrypt(e.to_string()))?
        .encrypt_padded_mut::<Pkcs7>(&mut buf, padded_len)
        .map_err(|e| CipherError::Decrypt(e.to_string()))?
        .len();

    let mut blob = Vec::with_capacity(IV_LEN + body + MAC_LEN);
    blob.extend_from_slice(iv);
    blob.extend_from_slice(&buf[..body]);
    let mac = HmacSha256Hasher::mac(mac_key, &blob)
        .map_err(|_| CipherError::InvalidKeyLength { expected: MAC_KEY_LEN, actual: mac_key.len() })?;
    blob.extend_from_slice(&mac);

    let digest = Sha256Hasher::digest(&blob);
    trace!(plaintext = plaintext.len(), padded = padded_len, blob = blob.len(), "sealed attachment blob");

    Ok(SealedBlob {
        blob,
        digest,
        unpadded_size: plaintext.len() as u64,
    })
}

/// The production [`AttachmentCipher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedBlobCipher;

impl SealedBlobCipher {
    pub fn new() -> Self { Self }
}

impl AttachmentCipher for SealedBlobCipher {
    fn open(
        &self,
        ciphertext: &[u8],
        key: &[u8],
        digest: &[u8],
        unpadded_size: Option<u64>,
    ) -> Result<Vec<u8>> {
        let (aes_key, mac_key) = split_key(key)?;
        if digest.is_empty() {
            return Err(CipherError::MissingDigest);
        }

        if ciphertext.len() < IV_LEN + BLOCK_LEN + MAC_LEN {
            return Err(CipherError::Malformed(format!(
                "{} bytes is shorter than IV, one block and MAC",
                ciphertext.len()
            )));
        }
        let body_len = ciphertext.len() - IV_LEN - MAC_LEN;
        if body_len % BLOCK_LEN != 0 {
            return Err(CipherError::Malformed(format!(
                "body length {body_len} is not aligned to AES block size {BLOCK_LEN}"
            )));
        }

        verify(digest, &Sha256Hasher::digest(ciphertext)).map_err(|_| CipherError::DigestMismatch)?;

        let (authenticated, their_mac) = ciphertext.split_at(ciphertext.len() - MAC_LEN);
        let our_mac = HmacSha256Hasher::mac(mac_key, authenticated)
            .map_err(|_| CipherError::InvalidKeyLength { expected: MAC_KEY_LEN, actual: mac_key.len() })?;
        verify(their_mac, &our_mac).map_err(|_| CipherError::MacMismatch)?;

        let (iv, body) = authenticated.split_at(IV_LEN);
        let mut buf = body.to_vec();
        let plaintext_len = Aes256CbcDec::new_from_slices(aes_key, iv)
            .map_err(|e| CipherError::Decrypt(e.to_string()))?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|e| CipherError::Decrypt(format!("PKCS7 unpad failed: {e}")))?
            .len();
        buf.truncate(plaintext_len);

        if let Some(declared) = unpadded_size {
            let actual = buf.len() as u64;
            if declared > actual {
                return Err(CipherError::SizeMismatch { declared, actual });
            }
            let declared_len = declared as usize;
            if buf[declared_len..].iter().any(|b| *b != 0) {
                return Err(CipherError::SizeMismatch { declared, actual });
            }
            buf.truncate(declared_len);
        }

        trace!(ciphertext = ciphertext.len(), plaintext = buf.len(), "opened attachment blob");
        Ok(buf)
    }
}
