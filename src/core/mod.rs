//! Core plumbing shared by the workflow and the initializer:
//! configuration and atomic file writes.

pub mod atomic;
mod config;

pub use config::{Config, InitConfig, WorkflowConfig, PROJECT_CONFIG_FILE};
