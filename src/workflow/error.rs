//! Workflow error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::documents::{ArtifactKind, TaskId};
use super::session::Phase;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// The artifact version an approval was expected to name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub slug: String,
    pub version: u32,
}

impl fmt::Display for PendingApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.slug, self.version)
    }
}

fn describe_pending(pending: Option<&PendingApproval>, latest: Option<&u32>) -> String {
    match (pending, latest) {
        (None, _) => "nothing is awaiting this approval".to_string(),
        (Some(p), Some(latest)) => format!(
            "pending {p} is stale because v{latest} was stored outside this session; \
             abandon and resubmit the feature request"
        ),
        (Some(p), None) => format!("expected {p}"),
    }
}

/// Errors raised by the workflow state machine and the document store.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The action is not allowed in the current phase.
    #[error("cannot {action} while in phase {phase}")]
    InvalidTransition { phase: Phase, action: String },

    /// An approval named a slug/version other than the one awaiting approval.
    #[error(
        "cannot approve {kind} {slug} v{version} while in phase {phase}: {}",
        describe_pending(.pending.as_ref(), .latest.as_ref())
    )]
    ApprovalVersionMismatch {
        phase: Phase,
        kind: ArtifactKind,
        slug: String,
        version: u32,
        /// Version the session is waiting on
        pending: Option<PendingApproval>,
        /// Newer version in the store that makes `pending` stale
        latest: Option<u32>,
    },

    /// The task id is not part of the approved task list.
    #[error("task {id} is not in the approved task list")]
    UnknownTask { id: TaskId },

    /// Another task is already being implemented.
    #[error("cannot start task {requested}: task {current} is still in progress")]
    TaskAlreadyInProgress { current: TaskId, requested: TaskId },

    /// Backing storage could not be written.
    #[error("failed to persist {}: {source}", .path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No artifact of this kind exists for the slug.
    #[error("no {kind} found for '{slug}'")]
    NotFound { kind: ArtifactKind, slug: String },

    /// A stored artifact failed to parse or verify.
    #[error("artifact {} is corrupt: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    /// Another invocation holds the project's session lock.
    #[error("another session is active for this project (lock {})", .path.display())]
    SessionAlreadyActive { path: PathBuf, holder: Option<String> },
}

impl WorkflowError {
    /// Taxonomy name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::ApprovalVersionMismatch { .. } => "ApprovalVersionMismatch",
            Self::UnknownTask { .. } => "UnknownTask",
            Self::TaskAlreadyInProgress { .. } => "TaskAlreadyInProgress",
            Self::PersistenceFailure { .. } => "PersistenceFailure",
            Self::NotFound { .. } => "NotFound",
            Self::CorruptArtifact { .. } => "CorruptArtifact",
            Self::SessionAlreadyActive { .. } => "SessionAlreadyActive",
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::PersistenceFailure { path, source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::CorruptArtifact { path: path.into(), reason: reason.to_string() }
    }
}
