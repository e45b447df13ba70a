//! Encrypted attachment retrieval.
//!
//! [`Pipeline::retrieve`] turns an [`AttachmentPointer`] into a decrypted,
//! locally stored [`AttachmentStream`]:
//!
//! 1. a scratch file is allocated for the ciphertext ([`DownloadState`])
//! 2. the [`AttemptController`](parcel_fetch::AttemptController) downloads
//!    it through an injected [`Transport`](parcel_fetch::Transport), retrying
//!    connectivity failures and resuming where possible, while the
//!    [`SizeGuard`](parcel_fetch::SizeGuard) enforces the size ceiling and
//!    feeds progress to the [`DownloadJob`] and the [`EventBus`]
//! 3. the [`DecryptPool`] verifies and decrypts it, one attachment at a time
//!    across the whole process, and hands the plaintext to an
//!    [`ArtifactStore`]
//!
//! A [`KeepAliveGuard`] is held for the duration of every call, and the
//! scratch file is removed on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parcel::{
//!     AttachmentPointer, DecryptPool, DownloadJob, FsArtifactStore, ParcelConfig, Pipeline,
//!     PointerIdentity,
//! };
//! use parcel_cipher::SealedBlobCipher;
//! use parcel_fetch::ReqwestTransport;
//!
//! # async fn run(pointer: AttachmentPointer) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ParcelConfig::default();
//! let transport = ReqwestTransport::new(config.transport_config())?;
//! let pipeline = Pipeline::new(
//!     transport,
//!     config.locator()?,
//!     &config.paths.scratch_dir,
//!     DecryptPool::new(SealedBlobCipher::new()),
//!     Arc::new(FsArtifactStore::new(&config.paths.artifact_dir)),
//! )
//! .retry_policy(config.retry_policy());
//!
//! let job = DownloadJob::new(pointer.id.clone());
//! let stream = pipeline.retrieve(&job, &pointer, &PointerIdentity).await?;
//! println!("{} bytes at {}", stream.len, stream.path.display());
//! # Ok(())
//! # }
//! ```

mod config;
mod decrypt;
mod error;
mod events;
mod job;
mod keep_alive;
mod locator;
mod pipeline;
mod pointer;
mod store;

pub use config::{
    CONFIG_ENV, ConfigError, EventsConfig, LoggingConfig, NetworkConfig, ParcelConfig, PathsConfig,
    RetryConfig,
};
pub use decrypt::DecryptPool;
pub use error::{DecryptError, PipelineError};
pub use events::{AttachmentEvent, EventBus};
pub use job::DownloadJob;
pub use keep_alive::{CountingKeepAlive, KeepAlive, KeepAliveGuard, NoopKeepAlive};
pub use locator::{CIPHERTEXT_CONTENT_TYPE, CONTENT_TYPE_HEADER, ResourceLocator};
pub use pipeline::{DownloadState, Pipeline};
pub use pointer::{AttachmentId, AttachmentPointer};
pub use store::{ArtifactStore, AttachmentStream, FsArtifactStore, PointerIdentity, ReadTransaction, StoreError};
