use std::sync::Arc;

use anyhow::Context;
use parcel::{AttachmentPointer, DecryptPool, DownloadJob, FsArtifactStore, ParcelConfig, Pipeline, PointerIdentity};
use parcel_cipher::SealedBlobCipher;
use parcel_fetch::ReqwestTransport;
use tracing::debug;

use crate::app::FetchArgs;
use crate::tracker;

pub async fn run(args: FetchArgs, mut config: ParcelConfig) -> anyhow::Result<()> {
    if let Some(out_dir) = args.out_dir {
        config.paths.artifact_dir = out_dir;
    }
    if let Some(cdn) = args.cdn {
        config.network.cdn_base = cdn;
    }

    let json = std::fs::read_to_string(&args.pointer)
        .with_context(|| format!("failed to read pointer {}", args.pointer.display()))?;
    let pointer = AttachmentPointer::from_json(&json)
        .with_context(|| format!("invalid pointer {}", args.pointer.display()))?;
    debug!(?pointer, "loaded pointer");

    let transport = ReqwestTransport::new(config.transport_config())?;
    let pipeline = Pipeline::new(
        transport,
        config.locator()?,
        &config.paths.scratch_dir,
        DecryptPool::new(SealedBlobCipher::new()),
        Arc::new(FsArtifactStore::new(&config.paths.artifact_dir)),
    )
    .retry_policy(config.retry_policy())
    .events(parcel::EventBus::new(config.events.capacity));

    let bar = (!args.quiet).then(|| tracker::track(pipeline.event_bus().subscribe(), pointer.id.clone(), "fetch"));

    let job = DownloadJob::new(pointer.id.clone());
    let result = pipeline.retrieve(&job, &pointer, &PointerIdentity).await;
    if let Some(bar) = bar
        && let Err(e) = bar.await
    {
        debug!(error = %e, "progress tracker task ended abnormally");
    }

    let stream = result.with_context(|| format!("failed to retrieve attachment {}", pointer.id))?;
    println!("{}", stream.path.display());
    Ok(())
}
