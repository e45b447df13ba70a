use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::{Result, VerificationError};

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

pub struct Sha256Hasher(Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

impl Default for Sha256Hasher {
    fn default() -> Self { Self::new() }
}

impl Sha256Hasher {
    pub fn new() -> Self { Self(Sha256::new()) }

    pub fn digest(data: &[u8]) -> Vec<u8> { Sha256::digest(data).to_vec() }
}

/// Keyed HMAC-SHA256, used to authenticate ciphertext before decrypting it.
pub struct HmacSha256Hasher(Hmac<Sha256>);

impl HmacSha256Hasher {
    pub fn new(key: &[u8]) -> Result<Self> {
        <Hmac<Sha256> as Mac>::new_from_slice(key)
            .map(Self)
            .map_err(|_| VerificationError::InvalidKeyLength(key.len()))
    }

    pub fn mac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Self::new(key)?;
        hasher.update(data);
        Ok(hasher.finalize())
    }
}

impl Hasher for HmacSha256Hasher {
    fn update(&mut self, data: &[u8]) { Mac::update(&mut self.0, data); }
    fn finalize(self) -> Vec<u8> { Mac::finalize(self.0).into_bytes().to_vec() }
}
