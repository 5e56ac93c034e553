//! Approval-gated feature workflow.
//!
//! A feature moves through three human-gated phases:
//!
//! 1. **Requirements** - a feature request becomes a versioned PRD
//! 2. **Tasks** - an approved PRD is broken down into a versioned task list
//! 3. **Implementation** - tasks from the approved list are started and
//!    completed one at a time
//!
//! ## Artifacts
//!
//! - `<slug>-prd.v<N>.md` - requirements document, version N
//! - `<slug>-tasks.v<N>.md` - task list, version N
//! - `<slug>.manifest.json` - version ledger with approval status and checksums

mod documents;
mod error;
mod lock;
mod machine;
mod render;
mod session;
mod store;

pub use documents::{
    slugify, ApprovalStatus, ArtifactKind, FeatureRequest, RequirementsDocument, TaskBreakdown,
    TaskId, TaskItem, TaskList, TaskSection, TaskStatus,
};
pub use error::{PendingApproval, WorkflowError, WorkflowResult};
pub use lock::{SessionLock, LOCK_FILE};
pub use machine::WorkflowMachine;
pub use render::{DocumentRenderer, TemplateRenderer};
pub use session::{ActiveDocument, Phase, WorkflowSession, SESSION_FILE};
pub use store::{ArtifactRef, DocumentStore, Manifest, VersionRecord};
