use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::{Result, from_io};

/// A uniquely named file inside a scratch directory, removed when dropped.
///
/// The file is created empty so that the name is reserved; writers are free
/// to truncate or reopen it by path. Dropping the handle (including when the
/// owning future is cancelled) deletes whatever is at the path.
pub struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    pub fn create_in(dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(from_io)?;
        }
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(from_io)?;
        let path = file.into_temp_path();
        debug!(path = %path.display(), "allocated scratch file");
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    pub fn to_path_buf(&self) -> PathBuf { self.path().to_path_buf() }

    pub fn exists(&self) -> bool { self.path.as_ref().is_some_and(|p| p.exists()) }

    /// Size of the file on disk, `None` when it cannot be read.
    pub fn len(&self) -> Option<u64> {
        std::fs::metadata(self.path()).ok().map(|m| m.len())
    }

    /// Remove the file now, reporting failures instead of swallowing them.
    ///
    /// A file that is already gone counts as removed.
    pub fn discard(mut self) -> Result<()> {
        match self.path.take() {
            Some(path) => match path.close() {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(from_io(e)),
            },
            None => Ok(()),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            if let Err(e) = path.close()
                && e.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %shown, error = %e, "failed to remove scratch file");
            }
        }
    }
}

impl std::fmt::Debug for ScratchFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchFile").field("path", &self.path()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scratch_file_reserved_on_create() -> Result<()> {
        let dir = tempdir()?;
        let scratch = ScratchFile::create_in(dir.path(), "attachment")?;
        assert!(scratch.exists());
        assert_eq!(scratch.len(), Some(0));
        assert!(scratch.path().starts_with(dir.path()));
        Ok(())
    }

    #[test]
    fn test_scratch_file_creates_missing_dir() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("a/b");
        let scratch = ScratchFile::create_in(&nested, "attachment")?;
        assert!(nested.is_dir());
        assert!(scratch.exists());
        Ok(())
    }

    #[test]
    fn test_scratch_file_cleanup_on_drop() -> Result<()> {
        let dir = tempdir()?;
        let scratch = ScratchFile::create_in(dir.path(), "attachment")?;
        std::fs::write(scratch.path(), b"ciphertext")?;
        let path = scratch.to_path_buf();
        drop(scratch);
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_drop_tolerates_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let scratch = ScratchFile::create_in(dir.path(), "attachment")?;
        std::fs::remove_file(scratch.path())?;
        drop(scratch);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_discard_tolerates_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let scratch = ScratchFile::create_in(dir.path(), "attachment")?;
        std::fs::remove_file(scratch.path())?;
        scratch.discard()?;
        Ok(())
    }

    #[test]
    fn test_unique_names() -> Result<()> {
        let dir = tempdir()?;
        let a = ScratchFile::create_in(dir.path(), "attachment")?;
        let b = ScratchFile::create_in(dir.path(), "attachment")?;
        assert_ne!(a.path(), b.path());
        Ok(())
    }
}
