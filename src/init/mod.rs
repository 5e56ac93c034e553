//! Project initialization.
//!
//! Scaffolds a project layout into a directory that may already hold files,
//! leaving protected paths alone.

mod detector;
mod error;
mod initializer;
mod plan;
mod protected;
mod scaffold;
mod staging;
mod templates;

pub use detector::{ProjectDetector, ProjectType};
pub use error::{InitError, InitResult};
pub use initializer::{Conflict, InitMode, InitOptions, InitReport, SafeInitializer};
pub use plan::{EntryOutcome, MergeAction, MergePlan, PlanEntry};
pub use protected::{PathPattern, ProtectedPathSet};
pub use scaffold::{DirectoryScaffold, Scaffold, TemplateScaffold};
pub use staging::StagingArea;

use std::path::Path;

/// Pick the scaffold for `init`: a template directory, a named built-in, or
/// the built-in matching what the target already contains.
pub fn resolve_scaffold(
    target: &Path,
    template: Option<&str>,
    from: Option<&Path>,
) -> Result<Box<dyn Scaffold>, String> {
    if let Some(dir) = from {
        return Ok(Box::new(DirectoryScaffold::new(dir)));
    }

    let project_type = match template {
        Some(name) => name.parse()?,
        None => ProjectDetector::new(target).detect(),
    };
    Ok(Box::new(TemplateScaffold::builtin(project_type)))
}
