//! Merge planning and application.
//!
//! A plan is computed from the staged tree and the current target before any
//! write happens. Application then works only from the plan.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use parking_lot::Mutex;
use walkdir::WalkDir;

use super::error::{InitError, InitResult};
use super::protected::ProtectedPathSet;
use crate::core::atomic::copy_atomic;

/// What to do with one staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Target path does not exist yet
    Copy,
    /// Target path exists and is not protected
    Overwrite,
    /// Target path is protected
    Skip,
}

/// One staged file and its planned action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Path relative to both the staging root and the target
    pub path: PathBuf,
    pub action: MergeAction,
}

/// Result of applying one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Copied,
    Overwritten,
    /// Target already held identical bytes
    Unchanged,
}

/// Fully materialized merge plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Unprotected directories to ensure exist, parents first
    pub directories: Vec<PathBuf>,
    /// Files in walk order
    pub entries: Vec<PlanEntry>,
}

impl MergePlan {
    /// Walk `staged` and decide an action for every file against `target`.
    pub fn compute(staged: &Path, target: &Path, protected: &ProtectedPathSet) -> io::Result<Self> {
        let mut plan = Self::default();

        for entry in WalkDir::new(staged).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(staged)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
                .to_path_buf();
            let file_type = entry.file_type();

            if !file_type.is_dir() && !file_type.is_file() {
                tracing::warn!(path = %relative.display(), "skipping non-regular staged entry");
                continue;
            }

            let writable = match resolve_in_target(target, &relative)? {
                Some(resolved) => {
                    !protected.is_protected(&relative) && !protected.is_protected(&resolved)
                }
                None => false,
            };

            if file_type.is_dir() {
                if writable {
                    plan.directories.push(relative);
                }
                continue;
            }

            let action = if !writable {
                MergeAction::Skip
            } else if fs::symlink_metadata(target.join(&relative)).is_ok() {
                MergeAction::Overwrite
            } else {
                MergeAction::Copy
            };

            plan.entries.push(PlanEntry { path: relative, action });
        }

        Ok(plan)
    }

    /// Entries with the given action.
    pub fn with_action(&self, action: MergeAction) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(move |e| e.action == action)
    }

    /// Protected paths the skeleton wanted to write.
    pub fn skipped(&self) -> Vec<&Path> {
        self.with_action(MergeAction::Skip).map(|e| e.path.as_path()).collect()
    }

    /// Apply the plan with up to `jobs` worker threads.
    ///
    /// Every entry names a distinct target path, so workers never write the
    /// same file. The first failure stops remaining work.
    pub fn apply(
        &self,
        staged: &Path,
        target: &Path,
        jobs: usize,
    ) -> InitResult<Vec<(PathBuf, EntryOutcome)>> {
        for dir in &self.directories {
            let path = target.join(dir);
            fs::create_dir_all(&path)
                .map_err(|source| InitError::MergeApplyFailure { path, source })?;
        }

        let work: Vec<&PlanEntry> =
            self.entries.iter().filter(|e| e.action != MergeAction::Skip).collect();
        if work.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = work.len().div_ceil(jobs.max(1));
        let outcomes = Mutex::new(Vec::with_capacity(work.len()));
        let failure: Mutex<Option<InitError>> = Mutex::new(None);

        thread::scope(|scope| {
            for chunk in work.chunks(chunk_size) {
                let outcomes = &outcomes;
                let failure = &failure;
                scope.spawn(move || {
                    for entry in chunk {
                        if failure.lock().is_some() {
                            return;
                        }
                        match apply_entry(staged, target, entry) {
                            Ok(outcome) => outcomes.lock().push((entry.path.clone(), outcome)),
                            Err(err) => {
                                failure.lock().get_or_insert(err);
                                return;
                            }
                        }
                    }
                });
            }
        });

        if let Some(err) = failure.into_inner() {
            return Err(err);
        }

        let mut outcomes = outcomes.into_inner();
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(outcomes)
    }
}

/// Target-relative path that writing `relative` under `target` would reach,
/// following symlinked ancestors. `None` when it escapes the target or a
/// symlink on the way is dangling.
fn resolve_in_target(target: &Path, relative: &Path) -> io::Result<Option<PathBuf>> {
    let components: Vec<_> = relative.components().collect();
    let Some((last, ancestors)) = components.split_last() else {
        return Ok(Some(relative.to_path_buf()));
    };

    let mut resolved = PathBuf::new();
    for component in ancestors {
        resolved.push(component);
        let path = target.join(&resolved);
        // Missing or unreadable ancestors are left for apply to report
        if !fs::symlink_metadata(&path).is_ok_and(|meta| meta.file_type().is_symlink()) {
            continue;
        }

        let root = fs::canonicalize(target)?;
        let Ok(real) = fs::canonicalize(&path) else {
            tracing::debug!(path = %path.display(), "dangling symlink in target");
            return Ok(None);
        };
        match real.strip_prefix(&root) {
            Ok(inside) => resolved = inside.to_path_buf(),
            Err(_) => {
                tracing::debug!(path = %path.display(), real = %real.display(), "symlink leaves target");
                return Ok(None);
            }
        }
    }

    resolved.push(last);
    Ok(Some(resolved))
}

fn apply_entry(staged: &Path, target: &Path, entry: &PlanEntry) -> InitResult<EntryOutcome> {
    let src = staged.join(&entry.path);
    let dst = target.join(&entry.path);
    let fail = |source| InitError::MergeApplyFailure { path: dst.clone(), source };

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    if entry.action == MergeAction::Overwrite && same_contents(&src, &dst).map_err(fail)? {
        return Ok(EntryOutcome::Unchanged);
    }

    copy_atomic(&src, &dst).map_err(fail)?;
    tracing::trace!(path = %entry.path.display(), action = ?entry.action, "applied");

    Ok(match entry.action {
        MergeAction::Overwrite => EntryOutcome::Overwritten,
        _ => EntryOutcome::Copied,
    })
}

fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    let (meta_a, meta_b) = (fs::metadata(a)?, fs::symlink_metadata(b)?);
    if !meta_b.is_file() || meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_compute_marks_actions() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(staged.path(), ".cursor/config", "new");
        write(staged.path(), "src/index.ts", "export {};");
        write(staged.path(), "README.md", "# App");
        write(target.path(), "README.md", "# Existing");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();

        let action = |p: &str| plan.entries.iter().find(|e| e.path == Path::new(p)).unwrap().action;
        assert_eq!(action(".cursor/config"), MergeAction::Skip);
        assert_eq!(action("src/index.ts"), MergeAction::Copy);
        assert_eq!(action("README.md"), MergeAction::Overwrite);
        assert_eq!(plan.directories, vec![PathBuf::from("src")]);
        assert_eq!(plan.skipped(), vec![Path::new(".cursor/config")]);
    }

    #[test]
    fn test_protected_absent_in_target_is_still_skipped() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(staged.path(), "tasks/example.md", "x");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();
        assert_eq!(plan.entries[0].action, MergeAction::Skip);

        plan.apply(staged.path(), target.path(), 2).unwrap();
        assert!(!target.path().join("tasks").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_into_protected_path_is_skipped() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(target.path(), "tasks/Foo-PRD.md", "# Foo");
        std::os::unix::fs::symlink(target.path().join("tasks"), target.path().join("docs")).unwrap();
        write(staged.path(), "docs/Foo-PRD.md", "clobbered");
        write(staged.path(), "docs/nested/new.md", "new");
        write(staged.path(), "src/index.ts", "export {};");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();
        assert_eq!(
            plan.skipped(),
            vec![Path::new("docs/Foo-PRD.md"), Path::new("docs/nested/new.md")]
        );
        assert_eq!(plan.directories, vec![PathBuf::from("docs"), PathBuf::from("src")]);

        plan.apply(staged.path(), target.path(), 2).unwrap();
        assert_eq!(fs::read_to_string(target.path().join("tasks/Foo-PRD.md")).unwrap(), "# Foo");
        assert!(!target.path().join("tasks/nested").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_leaving_target_is_skipped() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), target.path().join("vendor")).unwrap();
        write(staged.path(), "vendor/lib.js", "x");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();
        assert_eq!(plan.skipped(), vec![Path::new("vendor/lib.js")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_target_follows_policy_of_real_path() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::create_dir_all(target.path().join("lib")).unwrap();
        std::os::unix::fs::symlink(target.path().join("lib"), target.path().join("src")).unwrap();
        write(staged.path(), "src/index.ts", "export {};");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();
        assert_eq!(plan.entries[0].action, MergeAction::Copy);
    }

    #[test]
    fn test_apply_copies_and_detects_unchanged() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        for i in 0..20 {
            write(staged.path(), &format!("src/mod{i}.rs"), &format!("// {i}"));
        }
        write(target.path(), "src/mod3.rs", "// 3");
        write(target.path(), "src/mod4.rs", "// old");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();
        let outcomes = plan.apply(staged.path(), target.path(), 4).unwrap();

        assert_eq!(outcomes.len(), 20);
        let outcome = |p: &str| outcomes.iter().find(|(path, _)| path == Path::new(p)).unwrap().1;
        assert_eq!(outcome("src/mod3.rs"), EntryOutcome::Unchanged);
        assert_eq!(outcome("src/mod4.rs"), EntryOutcome::Overwritten);
        assert_eq!(outcome("src/mod0.rs"), EntryOutcome::Copied);
        assert_eq!(fs::read_to_string(target.path().join("src/mod4.rs")).unwrap(), "// 4");
    }

    #[test]
    fn test_apply_failure_on_file_in_place_of_directory() {
        let staged = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(staged.path(), "src/index.ts", "export {};");
        write(target.path(), "src", "i am a file");

        let plan = MergePlan::compute(staged.path(), target.path(), &ProtectedPathSet::default())
            .unwrap();
        let err = plan.apply(staged.path(), target.path(), 1).unwrap_err();
        assert_eq!(err.kind(), "MergeApplyFailure");
    }
}
