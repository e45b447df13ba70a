//! Local artifact placement for decrypted attachments.
//!
//! The pipeline does not manage persistence transactions; the caller hands in
//! a [`ReadTransaction`] that names the artifact, and an [`ArtifactStore`]
//! that durably holds the plaintext under that name.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use parcel_fs::{AtomicWriteOptions, atomic_write};
use thiserror::Error;
use tracing::debug;

use crate::pointer::{AttachmentId, AttachmentPointer};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid artifact key: {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Fs(#[from] parcel_fs::Error),
}

/// Caller-supplied persistence handle used to derive an artifact identity.
pub trait ReadTransaction: Send + Sync {
    fn artifact_key(&self, pointer: &AttachmentPointer) -> String;
}

/// Names artifacts after the attachment id.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointerIdentity;

impl ReadTransaction for PointerIdentity {
    fn artifact_key(&self, pointer: &AttachmentPointer) -> String { pointer.id.as_str().to_owned() }
}

/// Durable home for decrypted plaintext.
///
/// Called from the decrypt worker thread, so implementations may block.
pub trait ArtifactStore: Send + Sync {
    fn write(
        &self,
        artifact_key: &str,
        pointer: &AttachmentPointer,
        plaintext: &[u8],
    ) -> Result<AttachmentStream, StoreError>;
}

/// Handle to a finished, decrypted artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentStream {
    pub attachment_id: AttachmentId,
    pub artifact_key:  String,
    pub path:          PathBuf,
    pub len:           u64,
    pub content_type:  Option<String>,
}

impl AttachmentStream {
    pub fn open(&self) -> io::Result<File> { File::open(&self.path) }

    pub fn read_all(&self) -> io::Result<Vec<u8>> { std::fs::read(&self.path) }
}

/// Stores each artifact as `<root>/<artifact key>`.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn path_for(&self, artifact_key: &str) -> Result<PathBuf, StoreError> {
        let valid = !artifact_key.is_empty()
            && artifact_key != "."
            && artifact_key != ".."
            && !artifact_key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(StoreError::InvalidKey(artifact_key.to_owned()));
        }
        Ok(self.root.join(artifact_key))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn write(
        &self,
        artifact_key: &str,
        pointer: &AttachmentPointer,
        plaintext: &[u8],
    ) -> Result<AttachmentStream, StoreError> {
        let path = self.path_for(artifact_key)?;
        atomic_write(&path, plaintext, AtomicWriteOptions::new())?;
        debug!(
            attachment_id = %pointer.id,
            path = %path.display(),
            bytes = plaintext.len(),
            "stored decrypted artifact"
        );
        Ok(AttachmentStream {
            attachment_id: pointer.id.clone(),
            artifact_key:  artifact_key.to_owned(),
            path,
            len:           plaintext.len() as u64,
            content_type:  pointer.content_type.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pointer() -> AttachmentPointer { AttachmentPointer::new("att-7", "7", vec![1]) }

    #[test]
    fn test_write_places_plaintext_under_key() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("artifacts"));
        let key = PointerIdentity.artifact_key(&pointer());

        let stream = store.write(&key, &pointer(), b"hello").unwrap();
        assert_eq!(stream.path, dir.path().join("artifacts").join("att-7"));
        assert_eq!(stream.len, 5);
        assert_eq!(stream.read_all().unwrap(), b"hello");
        assert_eq!(stream.attachment_id, pointer().id);
    }

    #[test]
    fn test_rejects_keys_escaping_root() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        for key in ["", ".", "..", "../x", "a/b", "a\\b"] {
            assert!(
                matches!(store.write(key, &pointer(), b"x"), Err(StoreError::InvalidKey(_))),
                "{key:?} accepted"
            );
        }
    }

    #[test]
    fn test_overwrite_replaces_artifact() {
        let dir = tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.write("k", &pointer(), b"first").unwrap();
        let stream = store.write("k", &pointer(), b"second").unwrap();
        assert_eq!(stream.read_all().unwrap(), b"second");
    }
}
