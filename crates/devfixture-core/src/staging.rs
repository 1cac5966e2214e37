//! Staging areas
//!
//! Every create or restore works inside its own scratch directory. The
//! directory is only deleted when the caller explicitly releases it after a
//! successful operation; on any failure it stays on disk so the operator can
//! inspect what was staged.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

const PREFIX: &str = "devfixture-";

/// A uniquely named scratch directory owned by one operation.
#[derive(Debug)]
pub struct StagingArea {
    path: Option<PathBuf>,
}

impl StagingArea {
    /// Create a fresh directory under `root`, or under the system temp dir.
    pub fn acquire(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| Error::io_at(root, &e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| Error::io(format!("Failed to create staging directory: {e}")))?;

        let path = dir.keep();
        tracing::debug!(path = %path.display(), "staging area acquired");
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Delete the directory and everything in it.
    pub fn release(mut self) -> Result<()> {
        match self.path.take() {
            Some(path) => {
                std::fs::remove_dir_all(&path).map_err(|e| Error::io_at(&path, &e))?;
                tracing::debug!(path = %path.display(), "staging area released");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Give up ownership and leave the directory on disk.
    pub fn retain(mut self) -> PathBuf {
        let path = self.path.take().unwrap_or_default();
        tracing::debug!(path = %path.display(), "staging area retained");
        path
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            tracing::warn!(
                "staging area dropped without release - leaving {} on disk",
                path.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_creates_unique_dirs() -> Result<()> {
        let root = tempfile::tempdir()?;
        let a = StagingArea::acquire(Some(root.path()))?;
        let b = StagingArea::acquire(Some(root.path()))?;

        assert!(a.path().is_dir());
        assert!(b.path().is_dir());
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(PREFIX)));

        a.release()?;
        b.release()?;
        Ok(())
    }

    #[test]
    fn test_release_deletes_recursively() -> Result<()> {
        let root = tempfile::tempdir()?;
        let area = StagingArea::acquire(Some(root.path()))?;
        let path = area.path().to_path_buf();
        std::fs::create_dir_all(path.join("nested/deeper"))?;
        std::fs::write(path.join("nested/deeper/file.txt"), "x")?;

        area.release()?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn test_retain_and_drop_keep_directory() -> Result<()> {
        let root = tempfile::tempdir()?;

        let retained = StagingArea::acquire(Some(root.path()))?.retain();
        assert!(retained.is_dir());

        let dropped_path = {
            let area = StagingArea::acquire(Some(root.path()))?;
            area.path().to_path_buf()
        };
        assert!(dropped_path.is_dir());
        Ok(())
    }

    #[test]
    fn test_acquire_creates_missing_root() -> Result<()> {
        let root = tempfile::tempdir()?;
        let nested = root.path().join("a/b");
        let area = StagingArea::acquire(Some(&nested))?;
        assert!(area.path().starts_with(&nested));
        area.release()
    }
}
