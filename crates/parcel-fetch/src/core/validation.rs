use std::path::Path;

use crate::data::MAX_DOWNLOAD_SIZE;
use crate::error::FetchError;

/// Check what a transport reported as complete before anything trusts it.
///
/// The file must sit exactly where it was requested and must not exceed the
/// global ceiling, whatever the progress ticks claimed along the way.
pub fn validate_completed(requested: &Path, completed: &Path) -> Result<u64, FetchError> {
    if requested != completed {
        return Err(FetchError::DestinationMismatch {
            expected: requested.to_path_buf(),
            actual:   completed.to_path_buf(),
        });
    }

    let len = std::fs::metadata(completed)
        .map(|m| m.len())
        .map_err(|_| FetchError::MissingSize)?;

    if len > MAX_DOWNLOAD_SIZE {
        return Err(FetchError::SizeLimit {
            observed: len,
            limit:    MAX_DOWNLOAD_SIZE,
        });
    }

    Ok(len)
}
