//! Initializer error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for initializer operations.
pub type InitResult<T> = Result<T, InitError>;

/// Errors raised while scaffolding a project.
#[derive(Debug, Error)]
pub enum InitError {
    /// The staging area (or the skeleton inside it) could not be created.
    /// The target was not touched.
    #[error("failed to create staging area{}: {source}", .path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    StagingCreationFailure {
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },

    /// Writing into the target failed part-way. The target may be partially updated.
    #[error("failed to merge into {}: {source}", .path.display())]
    MergeApplyFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The staging area could not be removed; residue is left on disk.
    #[error("failed to remove staging area {}: {source}", .path.display())]
    StagingCleanupFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
        /// Error that happened before cleanup, if any
        merge_error: Option<Box<InitError>>,
    },
}

impl InitError {
    /// Taxonomy name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StagingCreationFailure { .. } => "StagingCreationFailure",
            Self::MergeApplyFailure { .. } => "MergeApplyFailure",
            Self::StagingCleanupFailure { .. } => "StagingCleanupFailure",
        }
    }

    /// Whether the process should stop trusting the filesystem state.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Self::StagingCleanupFailure { .. })
    }

    /// Attach the error that preceded a cleanup failure.
    pub(crate) fn after(self, earlier: Option<Self>) -> Self {
        match self {
            Self::StagingCleanupFailure { path, source, .. } => {
                Self::StagingCleanupFailure { path, source, merge_error: earlier.map(Box::new) }
            }
            other => other,
        }
    }
}
