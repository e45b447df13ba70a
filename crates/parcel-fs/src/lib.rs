//! Filesystem primitives for the attachment pipeline.
//!
//! - [`ScratchFile`]: a per-download temporary file that is deleted on every
//!   exit path, including cancellation of the owning future.
//! - [`atomic_write`]: durable placement of finished artifacts, so a reader
//!   never observes a half-written plaintext.

mod error;
mod scratch;

pub use error::{Error, Result, from_io};
pub use scratch::ScratchFile;

use std::io::Write;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
const DEFAULT_PERMISSIONS: u32 = 0o600;

#[cfg(not(unix))]
const DEFAULT_PERMISSIONS: u32 = 0;

#[derive(Clone, Copy, Debug)]
pub struct AtomicWriteOptions {
    permissions: u32,
    prefix:      &'static str,
    suffix:      &'static str,
}

impl Default for AtomicWriteOptions {
    fn default() -> Self { Self::new() }
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self {
            permissions: DEFAULT_PERMISSIONS,
            prefix:      ".",
            suffix:      ".tmp",
        }
    }

    #[cfg(unix)]
    pub fn permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    #[cfg(not(unix))]
    pub fn permissions(self, _permissions: u32) -> Self { self }

    pub fn prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn suffix(mut self, suffix: &'static str) -> Self {
        self.suffix = suffix;
        self
    }

    #[cfg(unix)]
    fn into_permissions(self) -> Option<std::fs::Permissions> {
        Some(std::fs::Permissions::from_mode(self.permissions))
    }

    #[cfg(not(unix))]
    fn into_permissions(self) -> Option<std::fs::Permissions> { None }
}

/// Write `content` to a uniquely named sibling temporary file, flush it to
/// disk and rename it over `path`.
///
/// Concurrent writers to the same `path` each stage their own file; the last
/// rename wins. The staged file is removed if any step before the rename
/// fails.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let file_name = path.file_name().ok_or(Error::NoFileName)?.to_string_lossy();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(from_io)?;
    }

    let prefix = format!("{}{}", options.prefix, file_name);
    let mut staged = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(options.suffix)
        .tempfile_in(parent)
        .map_err(from_io)?;

    staged.write_all(content).map_err(from_io)?;
    if let Some(perms) = options.into_permissions() {
        staged.as_file().set_permissions(perms).map_err(from_io)?;
    }
    staged.as_file().sync_all().map_err(from_io)?;

    staged.persist(path).map_err(|e| from_io(e.error))?;

    tracing::trace!(path = %path.display(), bytes = content.len(), "atomic write committed");
    Ok(())
}
