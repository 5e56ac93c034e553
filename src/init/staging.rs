//! Scaffold staging area.
//!
//! A uniquely named temporary directory that holds a generated skeleton until
//! it is merged. It is removed by `close` on the normal path and by the
//! underlying `TempDir` drop during unwinding.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::error::{InitError, InitResult};

const STAGING_PREFIX: &str = "prdflow-staging-";

/// Isolated directory tree for a freshly generated skeleton.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Create a staging directory under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> InitResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(STAGING_PREFIX);

        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| InitError::StagingCreationFailure {
            path: root.map(Path::to_path_buf),
            source,
        })?;

        tracing::debug!(path = %dir.path().display(), "staging area created");
        Ok(Self { dir })
    }

    /// Root of the staged tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the staging directory, surfacing any failure.
    pub fn close(self) -> InitResult<()> {
        let path: PathBuf = self.dir.path().to_path_buf();

        self.dir
            .close()
            .map_err(|source| InitError::StagingCleanupFailure {
                path: path.clone(),
                source,
                merge_error: None,
            })?;

        if path.exists() {
            return Err(InitError::StagingCleanupFailure {
                path,
                source: std::io::Error::other("staging directory still exists after removal"),
                merge_error: None,
            });
        }

        tracing::debug!(path = %path.display(), "staging area removed");
        Ok(())
    }
}
