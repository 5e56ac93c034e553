//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Get the binary to test.
fn prdflow() -> Command {
    Command::cargo_bin("prdflow").unwrap()
}

/// A project directory with an empty project config, so user config is never read.
fn project() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".prdflow.toml").write_str("").unwrap();
    temp
}

fn run_in(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = prdflow();
    cmd.arg("-C").arg(temp.path());
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    prdflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Approval-gated feature workflow"));
}

#[test]
fn test_version_flag() {
    prdflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_subcommand() {
    prdflow().arg("frobnicate").assert().failure().stderr(predicate::str::contains("error"));
}

#[test]
fn test_invalid_task_id() {
    let temp = project();
    run_in(&temp)
        .args(["start", "one"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid task id"));
}

// ============================================================================
// Workflow Tests
// ============================================================================

#[test]
fn test_full_workflow() {
    let temp = project();

    run_in(&temp)
        .args(["request", "Login Form", "-d", "Users sign in with email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Drafted PRD login-form v1"))
        .stdout(predicate::str::contains("prdflow approve-prd login-form 1"));
    temp.child("tasks/login-form-prd.v1.md").assert(predicate::str::contains("# PRD: Login Form"));
    temp.child("tasks/login-form.manifest.json").assert(predicate::path::exists());

    run_in(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase: AwaitingRequirementsApproval"));

    run_in(&temp)
        .args(["approve-prd", "login-form", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Drafted task list v1 with 2 tasks"));
    temp.child("tasks/login-form-tasks.v1.md")
        .assert(predicate::str::contains("- [ ] 1.1 Implement: Users sign in with email"));

    run_in(&temp)
        .args(["approve-tasks", "login-form", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prdflow start 1.1"));

    run_in(&temp).args(["start", "1.1"]).assert().success();
    run_in(&temp)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Phase: Implementing(1.1)"))
        .stdout(predicate::str::contains("[~] 1.1"));

    run_in(&temp)
        .args(["start", "1.2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("task 1.1 is still in progress"));

    run_in(&temp)
        .args(["done", "1.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next: prdflow start 1.2"));
    run_in(&temp).args(["start", "1.2"]).assert().success();
    run_in(&temp)
        .args(["done", "1.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All tasks complete"));

    run_in(&temp).arg("status").assert().success().stdout(predicate::str::contains("Phase: Idle"));
    temp.child(".prdflow/session.lock").assert(predicate::path::missing());
}

#[test]
fn test_start_before_approval_names_phase() {
    let temp = project();
    run_in(&temp).args(["request", "Login Form"]).assert().success();

    run_in(&temp)
        .args(["start", "1.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("AwaitingRequirementsApproval"));
}

#[test]
fn test_double_approval_fails() {
    let temp = project();
    run_in(&temp).args(["request", "Login Form"]).assert().success();
    run_in(&temp).args(["approve-prd", "login-form", "1"]).assert().success();

    run_in(&temp)
        .args(["approve-prd", "login-form", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot approve"));
}

#[test]
fn test_request_without_usable_title_fails() {
    let temp = project();
    run_in(&temp)
        .args(["request", "!!!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must contain at least one letter or digit"));

    temp.child("tasks").assert(predicate::path::missing());
    run_in(&temp).arg("status").assert().success().stdout(predicate::str::contains("Phase: Idle"));
}

#[test]
fn test_held_lock_rejects_invocation() {
    let temp = project();
    temp.child(".prdflow/session.lock").write_str("pid=1\n").unwrap();

    run_in(&temp)
        .args(["request", "Login Form"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("another session is active"));
    temp.child("tasks").assert(predicate::path::missing());

    run_in(&temp)
        .arg("unlock")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed stale session lock"));
    run_in(&temp).args(["request", "Login Form"]).assert().success();
}

#[test]
fn test_show_and_history() {
    let temp = project();
    run_in(&temp).args(["request", "Login Form"]).assert().success();
    run_in(&temp).args(["approve-prd", "login-form", "1"]).assert().success();

    run_in(&temp)
        .args(["show", "login-form"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## Functional Requirements"));
    run_in(&temp)
        .args(["show", "login-form", "--tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("**Derived from:** login-form v1"));
    run_in(&temp)
        .args(["history", "login-form"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prd"))
        .stdout(predicate::str::contains("approved"))
        .stdout(predicate::str::contains("from prd v1"));

    run_in(&temp)
        .args(["show", "login-form", "--version", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# PRD: Login Form"));

    run_in(&temp)
        .args(["show", "signup"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no requirements document found for 'signup'"));
}

#[test]
fn test_abandon_returns_to_idle() {
    let temp = project();
    run_in(&temp).args(["request", "Login Form"]).assert().success();
    run_in(&temp).arg("abandon").assert().success();
    run_in(&temp).arg("status").assert().success().stdout(predicate::str::contains("Phase: Idle"));

    run_in(&temp)
        .args(["request", "Login Form"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login-form v2"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_merge_keeps_protected_files() {
    let temp = project();
    temp.child(".prdflow.toml").write_str("[init]\nstaging_dir = \"staging\"\n").unwrap();
    temp.child("staging").create_dir_all().unwrap();

    let target = temp.child("app");
    target.child(".cursor/config").write_str("user config").unwrap();
    target.child("tasks/Foo-PRD.md").write_str("# Foo").unwrap();

    run_in(&temp)
        .args(["init", "--template", "node"])
        .arg(target.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Created src/index.ts"))
        .stdout(predicate::str::contains("Skipped .cursor/rules/workflow.mdc (protected)"));

    target.child(".cursor/config").assert("user config");
    target.child("tasks/Foo-PRD.md").assert("# Foo");
    target.child("package.json").assert(predicate::path::exists());
    target.child(".cursor/rules/workflow.mdc").assert(predicate::path::missing());
    assert!(std::fs::read_dir(temp.child("staging").path()).unwrap().next().is_none());
}

#[test]
fn test_init_dry_run() {
    let temp = project();
    let target = temp.child("app");
    target.child("README.md").write_str("# Mine").unwrap();

    run_in(&temp)
        .args(["init", "--template", "rust", "--dry-run"])
        .arg(target.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("[DRY RUN] Would create Cargo.toml"))
        .stdout(predicate::str::contains("[DRY RUN] Would update README.md"));

    target.child("Cargo.toml").assert(predicate::path::missing());
    target.child("README.md").assert("# Mine");
}

#[test]
fn test_init_unknown_template() {
    let temp = project();
    run_in(&temp)
        .args(["init", "--template", "cobol"])
        .arg(temp.child("app").path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown template 'cobol'"));
}

// ============================================================================
// Config & Completions
// ============================================================================

#[test]
fn test_config_shows_defaults() {
    let temp = project();
    run_in(&temp)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("artifacts_dir = \"tasks\""))
        .stdout(predicate::str::contains("[init]"));
}

#[test]
fn test_completions() {
    prdflow()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prdflow"));
}
