//! Process-private scratch directories for downloads.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{UpdateError, UpdateResult};

/// Hands out scratch directories, one per update attempt.
pub trait ScratchSpace: Send + Sync {
    fn create(&self) -> UpdateResult<ScratchDir>;
}

/// A scratch directory that is removed, with its contents, when dropped.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file named `name` inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl From<TempDir> for ScratchDir {
    fn from(dir: TempDir) -> Self {
        Self { dir }
    }
}

/// [`ScratchSpace`] backed by `tempfile`, in the system temp dir or a chosen parent.
#[derive(Debug, Clone, Default)]
pub struct TempScratchSpace {
    parent: Option<PathBuf>,
}

impl TempScratchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create scratch directories under `parent` instead of the system temp dir.
    pub fn in_dir(parent: impl Into<PathBuf>) -> Self {
        Self {
            parent: Some(parent.into()),
        }
    }
}

impl ScratchSpace for TempScratchSpace {
    fn create(&self) -> UpdateResult<ScratchDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("geoipsync-");
        let dir = match &self.parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| UpdateError::CreateDirFailed {
            path: self.parent.clone().unwrap_or_else(std::env::temp_dir),
            source: e,
        })?;
        Ok(ScratchDir::from(dir))
    }
}
