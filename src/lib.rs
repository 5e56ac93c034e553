#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::trivially_copy_pass_by_ref)]
#![allow(clippy::cast_possible_truncation)]

//! # prdflow
//!
//! Approval-gated feature workflow for your repository.
//!
//! A feature request becomes a versioned requirements document (PRD); an
//! approved PRD becomes a task list; an approved task list is implemented one
//! task at a time. Nothing advances without an explicit approval naming the
//! exact version being approved.
//!
//! ## Features
//!
//! - **Versioned artifacts**: every PRD and task list revision is kept, with a checksummed manifest
//! - **Approval gates**: approvals name `slug` and `version`; stale approvals are rejected
//! - **Guarded implementation**: one task in progress at a time
//! - **Safe init**: scaffold a project into a populated directory without touching protected files
//!
//! ## Quick Start
//!
//! ```bash
//! prdflow request "Login Form"
//! prdflow approve-prd login-form 1
//! prdflow approve-tasks login-form 1
//! prdflow start 1.1
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod core;
pub mod init;
pub mod workflow;

// Re-export commonly used types
pub use core::Config;
pub use init::{InitError, InitReport, ProtectedPathSet, SafeInitializer};
pub use workflow::{
    DocumentStore, FeatureRequest, Phase, TaskId, WorkflowError, WorkflowMachine, WorkflowSession,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "prdflow";
