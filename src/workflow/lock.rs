//! Directory-scoped session lock.
//!
//! The lock file is created with create-new semantics, so a second invocation
//! against the same project fails fast instead of interleaving transitions.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::error::{WorkflowError, WorkflowResult};

/// File name of the lock inside the state directory.
pub const LOCK_FILE: &str = "session.lock";

/// Exclusive hold on a project's workflow session. Released on drop.
#[derive(Debug)]
pub struct SessionLock {
    path: PathBuf,
    released: bool,
}

impl SessionLock {
    /// Acquire the lock in `state_dir`, creating the directory if needed.
    pub fn acquire(state_dir: &Path) -> WorkflowResult<Self> {
        fs::create_dir_all(state_dir).map_err(WorkflowError::persistence(state_dir))?;
        let path = state_dir.join(LOCK_FILE);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .and_then(|s| s.lines().next().map(str::to_string));
                tracing::debug!(path = %path.display(), ?holder, "session lock is held");
                return Err(WorkflowError::SessionAlreadyActive { path, holder });
            }
            Err(err) => return Err(WorkflowError::persistence(&path)(err)),
        };

        let stamp = format!(
            "pid={}\nacquired={}\n",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        if let Err(err) = file.write_all(stamp.as_bytes()) {
            let _ = fs::remove_file(&path);
            return Err(WorkflowError::persistence(&path)(err));
        }

        tracing::debug!(path = %path.display(), "session lock acquired");
        Ok(Self { path, released: false })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock, surfacing removal errors.
    pub fn release(mut self) -> WorkflowResult<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(WorkflowError::persistence(&self.path))
    }

    /// Remove a lock left behind by a crashed invocation.
    ///
    /// Returns whether a lock file existed.
    pub fn force_remove(state_dir: &Path) -> WorkflowResult<bool> {
        let path = state_dir.join(LOCK_FILE);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::warn!(path = %path.display(), "removed stale session lock");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(WorkflowError::persistence(path)(err)),
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}
