//! Workflow session state.
//!
//! A session is a plain value: the state machine mutates it and the caller
//! decides where it lives. The CLI keeps it in `<state_dir>/session.json`.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::documents::{TaskId, TaskList};
use crate::core::atomic::write_atomic;

/// File name of the persisted session inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// Workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "task", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    DraftingRequirements,
    AwaitingRequirementsApproval,
    DraftingTasks,
    AwaitingTaskListApproval,
    Implementing(TaskId),
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::DraftingRequirements => write!(f, "DraftingRequirements"),
            Self::AwaitingRequirementsApproval => write!(f, "AwaitingRequirementsApproval"),
            Self::DraftingTasks => write!(f, "DraftingTasks"),
            Self::AwaitingTaskListApproval => write!(f, "AwaitingTaskListApproval"),
            Self::Implementing(id) => write!(f, "Implementing({id})"),
        }
    }
}

/// Slug and version of the PRD the session is working from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDocument {
    pub slug: String,
    pub version: u32,
}

/// The single active workflow instance for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowSession {
    /// Current phase
    pub phase: Phase,

    /// Active requirements document
    pub requirements: Option<ActiveDocument>,

    /// Active task list, including per-task progress
    pub task_list: Option<TaskList>,
}

impl WorkflowSession {
    /// A fresh, idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Task currently being implemented.
    pub fn current_task(&self) -> Option<TaskId> {
        match self.phase {
            Phase::Implementing(id) => Some(id),
            _ => None,
        }
    }

    /// Load from a session file; a missing file yields an idle session.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        let session = serde_json::from_str(&content)
            .with_context(|| format!("Session file {} is corrupt", path.display()))?;
        Ok(session)
    }

    /// Save to a session file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &content)
            .with_context(|| format!("Failed to write session {}", path.display()))?;
        Ok(())
    }
}
