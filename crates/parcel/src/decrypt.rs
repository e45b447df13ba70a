//! The single-lane decrypt stage.

use std::sync::Arc;

use parcel_cipher::AttachmentCipher;
use parcel_fs::ScratchFile;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::DecryptError;
use crate::pointer::AttachmentPointer;
use crate::store::{ArtifactStore, AttachmentStream};

/// Process-wide execution context that admits one decryption at a time.
///
/// Construct once at startup and clone into every pipeline; all clones share
/// the same permit, so at most one ciphertext and its plaintext are held in
/// memory regardless of how many downloads run concurrently.
#[derive(Clone)]
pub struct DecryptPool {
    permit: Arc<Semaphore>,
    cipher: Arc<dyn AttachmentCipher>,
}

impl DecryptPool {
    pub fn new(cipher: impl AttachmentCipher + 'static) -> Self {
        Self {
            permit: Arc::new(Semaphore::new(1)),
            cipher: Arc::new(cipher),
        }
    }

    /// Whether a decryption currently holds the permit.
    pub fn in_flight(&self) -> bool { self.permit.available_permits() == 0 }

    /// Stop admitting work; queued and future calls fail with
    /// [`DecryptError::PoolClosed`].
    pub fn close(&self) { self.permit.close(); }

    /// Decrypt `ciphertext` and hand the plaintext to `store`.
    ///
    /// The scratch file is consumed and removed whether or not decryption
    /// succeeds.
    pub async fn decrypt(
        &self,
        ciphertext: ScratchFile,
        pointer: &AttachmentPointer,
        artifact_key: String,
        store: Arc<dyn ArtifactStore>,
    ) -> Result<AttachmentStream, DecryptError> {
        let Some(key) = pointer.key.clone() else {
            discard(ciphertext);
            return Err(DecryptError::MissingKey);
        };

        let permit = match self.permit.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                discard(ciphertext);
                return Err(DecryptError::PoolClosed);
            }
        };

        let cipher = Arc::clone(&self.cipher);
        let pointer = pointer.clone();
        let worker = tokio::task::spawn_blocking(move || -> Result<AttachmentStream, DecryptError> {
            let _permit = permit;
            let bytes = std::fs::read(ciphertext.path());
            discard(ciphertext);
            let bytes = bytes.map_err(DecryptError::Read)?;

            debug!(attachment_id = %pointer.id, bytes = bytes.len(), "decrypting attachment");
            let plaintext = cipher.open(&bytes, &key, &pointer.digest, pointer.size)?;
            drop(bytes);

            Ok(store.write(&artifact_key, &pointer, &plaintext)?)
        });

        worker.await.map_err(|e| DecryptError::Worker(e.to_string()))?
    }
}

fn discard(ciphertext: ScratchFile) {
    let path = ciphertext.to_path_buf();
    if let Err(e) = ciphertext.discard() {
        warn!(path = %path.display(), error = %e, "failed to remove ciphertext scratch file");
    }
}

impl std::fmt::Debug for DecryptPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptPool")
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}
