//! Configuration management for Prdflow.
//!
//! Handles loading configuration from TOML files. Lookup order is an explicit
//! `--config` path, then `<project>/.prdflow.toml`, then the user config
//! directory, then built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::init::{InitOptions, ProtectedPathSet};

/// Name of the per-project configuration file.
pub const PROJECT_CONFIG_FILE: &str = ".prdflow.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workflow settings
    pub workflow: WorkflowConfig,

    /// Project initialization settings
    pub init: InitConfig,
}

/// Workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Directory (relative to the project root) holding PRDs and task lists
    pub artifacts_dir: PathBuf,

    /// Directory (relative to the project root) holding session state and the lock
    pub state_dir: PathBuf,

    /// Optional conventions file folded into generated PRDs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conventions: Option<PathBuf>,
}

/// Project initialization settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    /// Extra protected path patterns, added to the built-in defaults
    pub protected: Vec<String>,

    /// Where staging directories are created (system temp dir when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,

    /// Worker threads used when applying a merge (CPU count when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("tasks"),
            state_dir: PathBuf::from(".prdflow"),
            conventions: None,
        }
    }
}

impl Config {
    /// Load configuration for a project.
    pub fn load(project: &Path, explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let project_config = project.join(PROJECT_CONFIG_FILE);
        if project_config.exists() {
            return Self::load_from_file(&project_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let user_config = config_dir.join("config.toml");
            if user_config.exists() {
                return Self::load_from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Get the user configuration directory.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("prdflow"))
    }

    /// Absolute artifacts directory for a project.
    pub fn artifacts_path(&self, project: &Path) -> PathBuf {
        project.join(&self.workflow.artifacts_dir)
    }

    /// Absolute state directory for a project.
    pub fn state_path(&self, project: &Path) -> PathBuf {
        project.join(&self.workflow.state_dir)
    }

    /// Read the conventions text, if configured.
    pub fn conventions_text(&self, project: &Path) -> anyhow::Result<Option<String>> {
        let Some(path) = &self.workflow.conventions else {
            return Ok(None);
        };
        let path = project.join(path);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read conventions file {}", path.display()))?;
        Ok(Some(text))
    }

    /// Build the protected path policy: defaults plus configured extras.
    pub fn protected_paths(&self) -> ProtectedPathSet {
        ProtectedPathSet::with_defaults(&self.init.protected)
    }

    /// Build initializer options from the `[init]` section.
    pub fn init_options(&self) -> InitOptions {
        let mut options = InitOptions::default();
        options.staging_root.clone_from(&self.init.staging_dir);
        if let Some(jobs) = self.init.jobs {
            options.jobs = jobs.max(1);
        }
        options
    }
}
