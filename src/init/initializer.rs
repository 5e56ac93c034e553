//! Non-destructive project initialization.
//!
//! An empty target receives the skeleton directly. A populated target gets it
//! through a staging area: generate, plan against the target, apply the plan,
//! then remove the staging area whatever happened before.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::{InitError, InitResult};
use super::plan::{EntryOutcome, MergeAction, MergePlan};
use super::protected::ProtectedPathSet;
use super::scaffold::Scaffold;
use super::staging::StagingArea;

/// Options for the initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    /// Parent directory for staging areas (system temp dir when unset)
    pub staging_root: Option<PathBuf>,
    /// Plan and report without writing to the target
    pub dry_run: bool,
    /// Worker threads used while applying a merge
    pub jobs: usize,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self { staging_root: None, dry_run: false, jobs: num_cpus::get() }
    }
}

/// How the skeleton reached the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitMode {
    /// Target was empty, skeleton generated in place
    Direct,
    /// Skeleton staged and merged
    Merged,
    /// Skeleton staged and planned, nothing written
    DryRun,
}

/// A skeleton path left alone because it is protected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: PathBuf,
    /// Whether the target already had something at this path
    pub exists_in_target: bool,
}

/// Outcome of one initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub mode: InitMode,
    pub target: PathBuf,
    /// Files that did not exist before (would be created, in a dry run)
    pub copied: Vec<PathBuf>,
    /// Existing files replaced with different contents (would be replaced, in a dry run)
    pub overwritten: Vec<PathBuf>,
    /// Existing files that already matched the skeleton
    pub unchanged: Vec<PathBuf>,
    pub conflicts: Vec<Conflict>,
}

impl InitReport {
    fn new(mode: InitMode, target: &Path) -> Self {
        Self {
            mode,
            target: target.to_path_buf(),
            copied: Vec::new(),
            overwritten: Vec::new(),
            unchanged: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Number of files written (or that would be written).
    pub fn written(&self) -> usize {
        self.copied.len() + self.overwritten.len()
    }
}

/// Bootstraps a project layout without touching protected paths.
pub struct SafeInitializer<'a> {
    protected: &'a ProtectedPathSet,
    options: InitOptions,
    cleanup: fn(StagingArea) -> InitResult<()>,
}

impl<'a> SafeInitializer<'a> {
    pub fn new(protected: &'a ProtectedPathSet) -> Self {
        Self { protected, options: InitOptions::default(), cleanup: StagingArea::close }
    }

    #[cfg(test)]
    fn with_cleanup(mut self, cleanup: fn(StagingArea) -> InitResult<()>) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_options(mut self, options: InitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &InitOptions {
        &self.options
    }

    /// Write `scaffold` into `target`.
    ///
    /// Protected paths are never written on the merge path. The staging area
    /// is removed on every exit; failing to remove it is reported as
    /// [`InitError::StagingCleanupFailure`] carrying any earlier error.
    pub fn initialize(&self, scaffold: &dyn Scaffold, target: &Path) -> InitResult<InitReport> {
        tracing::info!(scaffold = %scaffold.name(), target = %target.display(), "initializing");

        if !self.options.dry_run && is_empty_dir(target)? {
            return generate_direct(scaffold, target);
        }

        let staging = StagingArea::create(self.options.staging_root.as_deref())?;
        let result = self.merge(scaffold, staging.path(), target);

        match (result, (self.cleanup)(staging)) {
            (Ok(report), Ok(())) => Ok(report),
            (Err(err), Ok(())) => Err(err),
            (result, Err(cleanup)) => {
                tracing::error!(error = %cleanup, "staging area left on disk");
                Err(cleanup.after(result.err()))
            }
        }
    }

    fn merge(&self, scaffold: &dyn Scaffold, staged: &Path, target: &Path) -> InitResult<InitReport> {
        scaffold.generate(staged).map_err(|source| InitError::StagingCreationFailure {
            path: Some(staged.to_path_buf()),
            source,
        })?;

        let plan = MergePlan::compute(staged, target, self.protected)
            .map_err(|source| InitError::MergeApplyFailure { path: target.to_path_buf(), source })?;

        let mode = if self.options.dry_run { InitMode::DryRun } else { InitMode::Merged };
        let mut report = InitReport::new(mode, target);

        for entry in plan.with_action(MergeAction::Skip) {
            let exists_in_target = fs::symlink_metadata(target.join(&entry.path)).is_ok();
            tracing::info!(path = %entry.path.display(), exists_in_target, "protected path skipped");
            report.conflicts.push(Conflict { path: entry.path.clone(), exists_in_target });
        }

        if self.options.dry_run {
            report.copied = plan.with_action(MergeAction::Copy).map(|e| e.path.clone()).collect();
            report.overwritten =
                plan.with_action(MergeAction::Overwrite).map(|e| e.path.clone()).collect();
            return Ok(report);
        }

        fs::create_dir_all(target)
            .map_err(|source| InitError::MergeApplyFailure { path: target.to_path_buf(), source })?;

        for (path, outcome) in plan.apply(staged, target, self.options.jobs)? {
            match outcome {
                EntryOutcome::Copied => report.copied.push(path),
                EntryOutcome::Overwritten => report.overwritten.push(path),
                EntryOutcome::Unchanged => report.unchanged.push(path),
            }
        }

        tracing::info!(
            copied = report.copied.len(),
            overwritten = report.overwritten.len(),
            unchanged = report.unchanged.len(),
            conflicts = report.conflicts.len(),
            "merge applied"
        );
        Ok(report)
    }
}

/// Missing counts as empty.
fn is_empty_dir(target: &Path) -> InitResult<bool> {
    match fs::read_dir(target) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(source) => Err(InitError::MergeApplyFailure { path: target.to_path_buf(), source }),
    }
}

fn generate_direct(scaffold: &dyn Scaffold, target: &Path) -> InitResult<InitReport> {
    let fail = |source| InitError::MergeApplyFailure { path: target.to_path_buf(), source };

    fs::create_dir_all(target).map_err(fail)?;
    scaffold.generate(target).map_err(fail)?;

    let mut report = InitReport::new(InitMode::Direct, target);
    for entry in WalkDir::new(target).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| fail(io::Error::from(e)))?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(target) {
                report.copied.push(relative.to_path_buf());
            }
        }
    }

    tracing::info!(files = report.copied.len(), "skeleton generated in place");
    Ok(report)
}
