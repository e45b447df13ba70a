use std::path::{Path, PathBuf};
use std::sync::Arc;

use parcel_fetch::{AttemptController, RetryPolicy, SizeGuard, Transport};
use parcel_fs::ScratchFile;
use tracing::{debug, info, warn};

use crate::decrypt::DecryptPool;
use crate::error::PipelineError;
use crate::events::{AttachmentEvent, EventBus};
use crate::job::DownloadJob;
use crate::keep_alive::{KeepAlive, KeepAliveGuard, NoopKeepAlive};
use crate::locator::ResourceLocator;
use crate::pointer::AttachmentPointer;
use crate::store::{ArtifactStore, AttachmentStream, ReadTransaction};

/// Per-call working state. Dropping it removes the ciphertext scratch file.
#[derive(Debug)]
pub struct DownloadState<'a> {
    pub job:        &'a DownloadJob,
    pub pointer:    &'a AttachmentPointer,
    pub ciphertext: ScratchFile,
}

impl<'a> DownloadState<'a> {
    pub fn new(job: &'a DownloadJob, pointer: &'a AttachmentPointer, scratch_dir: &Path) -> Result<Self, PipelineError> {
        let ciphertext = ScratchFile::create_in(scratch_dir, "attachment-")?;
        Ok(Self {
            job,
            pointer,
            ciphertext,
        })
    }
}

/// Download, decrypt and store one attachment at a time per call.
///
/// Calls for different jobs may run concurrently; they share the transport,
/// the [`DecryptPool`] and the [`EventBus`].
pub struct Pipeline<T: Transport> {
    transport:   T,
    policy:      RetryPolicy,
    locator:     ResourceLocator,
    scratch_dir: PathBuf,
    decryptor:   DecryptPool,
    store:       Arc<dyn ArtifactStore>,
    keep_alive:  Arc<dyn KeepAlive>,
    events:      EventBus,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(
        transport: T,
        locator: ResourceLocator,
        scratch_dir: impl Into<PathBuf>,
        decryptor: DecryptPool,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            locator,
            scratch_dir: scratch_dir.into(),
            decryptor,
            store,
            keep_alive: Arc::new(NoopKeepAlive),
            events: EventBus::default(),
        }
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Arc<dyn KeepAlive>) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn event_bus(&self) -> &EventBus { &self.events }

    pub fn transport(&self) -> &T { &self.transport }

    /// Fetch `pointer`, verify and decrypt it, and store the plaintext under
    /// the identity `txn` assigns.
    ///
    /// The process keep-alive is held for the whole call and the ciphertext
    /// scratch file never outlives it, whatever the outcome.
    pub async fn retrieve(
        &self,
        job: &DownloadJob,
        pointer: &AttachmentPointer,
        txn: &dyn ReadTransaction,
    ) -> Result<AttachmentStream, PipelineError> {
        let _keep_alive = KeepAliveGuard::acquire(Arc::clone(&self.keep_alive), format!("attachment {}", pointer.id));

        let result = self.run(job, pointer, txn).await;
        match &result {
            Ok(stream) => {
                info!(
                    attachment_id = %pointer.id,
                    bytes = stream.len,
                    path = %stream.path.display(),
                    "attachment retrieved"
                );
                self.events.publish(AttachmentEvent::Completed {
                    attachment_id: pointer.id.clone(),
                    bytes:         stream.len,
                });
            }
            Err(e) => {
                warn!(
                    attachment_id = %pointer.id,
                    bad_data = e.is_bad_data(),
                    error = %e,
                    "attachment retrieval failed"
                );
                self.events.publish(AttachmentEvent::Failed {
                    attachment_id: pointer.id.clone(),
                    reason:        e.to_string(),
                    bad_data:      e.is_bad_data(),
                });
            }
        }
        result
    }

    async fn run(
        &self,
        job: &DownloadJob,
        pointer: &AttachmentPointer,
        txn: &dyn ReadTransaction,
    ) -> Result<AttachmentStream, PipelineError> {
        let state = DownloadState::new(job, pointer, &self.scratch_dir)?;
        let ciphertext = self.download(state).await?;

        let artifact_key = txn.artifact_key(pointer);
        debug!(attachment_id = %pointer.id, artifact_key = %artifact_key, "download complete, queueing decrypt");
        let stream = self
            .decryptor
            .decrypt(ciphertext, pointer, artifact_key, Arc::clone(&self.store))
            .await?;
        Ok(stream)
    }

    /// Run the attempt controller into the state's scratch file, returning
    /// the file once it holds the complete ciphertext.
    async fn download(&self, state: DownloadState<'_>) -> Result<ScratchFile, PipelineError> {
        let DownloadState {
            job,
            pointer,
            ciphertext,
        } = state;

        let request = self.locator.request(pointer, ciphertext.path())?;
        let events = &self.events;
        let guard = SizeGuard::new(pointer.size, |fraction| {
            job.set_progress(fraction);
            events.publish(AttachmentEvent::Progress {
                attachment_id: pointer.id.clone(),
                fraction,
            });
        });

        debug!(attachment_id = %pointer.id, url = %request.url, "starting attachment download");
        AttemptController::new(&self.transport, self.policy)
            .run(&request, &guard)
            .await?;
        Ok(ciphertext)
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Pipeline<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("transport", &self.transport)
            .field("policy", &self.policy)
            .field("locator", &self.locator)
            .field("scratch_dir", &self.scratch_dir)
            .field("decryptor", &self.decryptor)
            .finish_non_exhaustive()
    }
}
