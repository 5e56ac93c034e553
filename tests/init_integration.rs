//! Initializer Integration Tests
//!
//! Exercises staged merges against populated target directories.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prdflow::init::{
    InitMode, InitOptions, ProtectedPathSet, SafeInitializer, Scaffold, TemplateScaffold,
};
use tempfile::TempDir;
use walkdir::WalkDir;

struct Env {
    staging: TempDir,
    target: TempDir,
    protected: ProtectedPathSet,
}

impl Env {
    fn new() -> Self {
        Self {
            staging: TempDir::new().unwrap(),
            target: TempDir::new().unwrap(),
            protected: ProtectedPathSet::default(),
        }
    }

    fn initializer(&self) -> SafeInitializer<'_> {
        SafeInitializer::new(&self.protected).with_options(InitOptions {
            staging_root: Some(self.staging.path().to_path_buf()),
            dry_run: false,
            jobs: 4,
        })
    }

    fn write(&self, rel: &str, contents: &str) {
        let path = self.target.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.target.path().join(rel)).unwrap()
    }

    fn staging_is_empty(&self) -> bool {
        fs::read_dir(self.staging.path()).unwrap().next().is_none()
    }

    fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        for entry in WalkDir::new(self.target.path()).sort_by_file_name() {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(self.target.path()).unwrap().to_path_buf();
                files.push((rel, fs::read(entry.path()).unwrap()));
            }
        }
        files
    }
}

/// Generates the inner scaffold, then fails.
struct FailAfter(TemplateScaffold);

impl Scaffold for FailAfter {
    fn name(&self) -> String {
        "fail-after".to_string()
    }

    fn generate(&self, dest: &Path) -> io::Result<()> {
        self.0.generate(dest)?;
        Err(io::Error::other("injected generator failure"))
    }
}

fn cursor_skeleton() -> TemplateScaffold {
    TemplateScaffold::new("scenario")
        .with_file(".cursor/config", "skeleton config")
        .with_file("src/index.ts", "export {};\n")
}

#[test]
fn test_protected_scenario() {
    let env = Env::new();
    env.write(".cursor/config", "user config");
    env.write("tasks/Foo-PRD.md", "# Foo");

    let report = env.initializer().initialize(&cursor_skeleton(), env.target.path()).unwrap();

    assert_eq!(report.mode, InitMode::Merged);
    assert_eq!(env.read(".cursor/config"), "user config");
    assert_eq!(env.read("tasks/Foo-PRD.md"), "# Foo");
    assert_eq!(env.read("src/index.ts"), "export {};\n");

    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].path, PathBuf::from(".cursor/config"));
    assert!(report.conflicts[0].exists_in_target);
    assert_eq!(report.copied, vec![PathBuf::from("src/index.ts")]);
    assert!(env.staging_is_empty());
}

#[test]
fn test_merge_is_idempotent() {
    let env = Env::new();
    env.write("README.md", "# Mine");
    env.write(".env", "SECRET=1");
    let skeleton = TemplateScaffold::builtin("node".parse().unwrap());

    env.initializer().initialize(&skeleton, env.target.path()).unwrap();
    let once = env.snapshot();

    let second = env.initializer().initialize(&skeleton, env.target.path()).unwrap();
    assert_eq!(env.snapshot(), once);
    assert_eq!(second.written(), 0);
    assert!(!second.unchanged.is_empty());
    assert!(env.staging_is_empty());
}

#[test]
fn test_protected_paths_never_modified() {
    let env = Env::new();
    env.write(".git/HEAD", "ref: refs/heads/main\n");
    env.write(".prdflow.toml", "[workflow]\n");
    env.write("tasks/login-form-prd.v1.md", "# PRD: Login Form\n");

    let skeleton = TemplateScaffold::new("intruder")
        .with_file(".git/HEAD", "garbage")
        .with_file(".git/config", "garbage")
        .with_file(".prdflow.toml", "garbage")
        .with_file("tasks/login-form-prd.v1.md", "garbage")
        .with_file("tasks/new.md", "garbage")
        .with_file("lib/app.js", "ok");

    let report = env.initializer().initialize(&skeleton, env.target.path()).unwrap();

    assert_eq!(env.read(".git/HEAD"), "ref: refs/heads/main\n");
    assert!(!env.target.path().join(".git/config").exists());
    assert_eq!(env.read(".prdflow.toml"), "[workflow]\n");
    assert_eq!(env.read("tasks/login-form-prd.v1.md"), "# PRD: Login Form\n");
    assert!(!env.target.path().join("tasks/new.md").exists());
    assert_eq!(env.read("lib/app.js"), "ok");
    assert_eq!(report.conflicts.len(), 5);
}

#[cfg(unix)]
#[test]
fn test_symlinked_directory_cannot_reach_protected_files() {
    let env = Env::new();
    env.write("tasks/Foo-PRD.md", "# Foo");
    std::os::unix::fs::symlink(env.target.path().join("tasks"), env.target.path().join("docs"))
        .unwrap();

    let skeleton = TemplateScaffold::new("docs")
        .with_file("docs/Foo-PRD.md", "CLOBBERED")
        .with_file("README.md", "# App");
    let report = env.initializer().initialize(&skeleton, env.target.path()).unwrap();

    assert_eq!(env.read("tasks/Foo-PRD.md"), "# Foo");
    assert_eq!(report.copied, vec![PathBuf::from("README.md")]);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].path, PathBuf::from("docs/Foo-PRD.md"));
    assert!(report.conflicts[0].exists_in_target);
    assert!(env.staging_is_empty());
}

#[test]
fn test_configured_protection_extends_defaults() {
    let mut env = Env::new();
    env.protected = ProtectedPathSet::with_defaults(&["design/"]);
    env.write("design/mockup.txt", "v1");

    let skeleton = TemplateScaffold::new("design")
        .with_file("design/mockup.txt", "v2")
        .with_file(".cursor/config", "x");
    let report = env.initializer().initialize(&skeleton, env.target.path()).unwrap();

    assert_eq!(env.read("design/mockup.txt"), "v1");
    assert_eq!(report.conflicts.len(), 2);
}

#[test]
fn test_generation_failure_leaves_target_and_staging_clean() {
    let env = Env::new();
    env.write("README.md", "# Mine");
    let before = env.snapshot();

    let err = env
        .initializer()
        .initialize(&FailAfter(cursor_skeleton()), env.target.path())
        .unwrap_err();

    assert_eq!(err.kind(), "StagingCreationFailure");
    assert_eq!(env.snapshot(), before);
    assert!(env.staging_is_empty());
}

#[test]
fn test_apply_failure_still_removes_staging() {
    let env = Env::new();
    env.write("src", "a file where the skeleton wants a directory");

    let err = env.initializer().initialize(&cursor_skeleton(), env.target.path()).unwrap_err();

    assert_eq!(err.kind(), "MergeApplyFailure");
    assert!(!err.is_unrecoverable());
    assert!(env.staging_is_empty());
}

#[test]
fn test_unusable_staging_root_fails_before_touching_target() {
    let env = Env::new();
    env.write("README.md", "# Mine");
    let before = env.snapshot();

    let bogus_root = env.staging.path().join("not-a-dir");
    fs::write(&bogus_root, "x").unwrap();

    let err = SafeInitializer::new(&env.protected)
        .with_options(InitOptions { staging_root: Some(bogus_root), dry_run: false, jobs: 1 })
        .initialize(&cursor_skeleton(), env.target.path())
        .unwrap_err();

    assert_eq!(err.kind(), "StagingCreationFailure");
    assert_eq!(env.snapshot(), before);
}

#[test]
fn test_dry_run_reports_without_writing() {
    let env = Env::new();
    env.write(".cursor/config", "user config");
    let before = env.snapshot();

    let report = SafeInitializer::new(&env.protected)
        .with_options(InitOptions {
            staging_root: Some(env.staging.path().to_path_buf()),
            dry_run: true,
            jobs: 2,
        })
        .initialize(&cursor_skeleton(), env.target.path())
        .unwrap();

    assert_eq!(report.mode, InitMode::DryRun);
    assert_eq!(report.copied, vec![PathBuf::from("src/index.ts")]);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(env.snapshot(), before);
    assert!(env.staging_is_empty());
}

#[test]
fn test_empty_target_fast_path() {
    let env = Env::new();
    let target = env.target.path().join("fresh");

    let report = env
        .initializer()
        .initialize(&TemplateScaffold::builtin("rust".parse().unwrap()), &target)
        .unwrap();

    assert_eq!(report.mode, InitMode::Direct);
    assert!(target.join("Cargo.toml").exists());
    assert!(target.join("tasks/.gitkeep").exists());
    assert!(env.staging_is_empty());
}
