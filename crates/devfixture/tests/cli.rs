//! Binary-level tests: argument parsing, preflight and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;

fn devfixture() -> Command {
    let mut cmd = Command::cargo_bin("devfixture").unwrap_or_else(|e| panic!("{e}"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_actions() {
    devfixture()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_version() {
    devfixture()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_action_exits_2() {
    devfixture().arg("destroy").assert().code(2);
}

#[test]
fn test_unknown_action_json_error() {
    devfixture()
        .args(["destroy", "--json"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("INVALID_ARGUMENT"));
}

#[test]
fn test_missing_tools_reported_before_anything_else() {
    let temp = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
    devfixture()
        .current_dir(temp.path())
        .env("PATH", "")
        .arg("create")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("pg_dump"))
        .stderr(predicate::str::contains("git"));

    let leftovers = std::fs::read_dir(temp.path())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0, "preflight failure must not touch the filesystem");
}

#[test]
fn test_missing_tools_json() {
    let temp = tempfile::tempdir().unwrap_or_else(|e| panic!("{e}"));
    devfixture()
        .current_dir(temp.path())
        .env("PATH", "")
        .args(["restore", "--json"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("\"success\": false"))
        .stdout(predicate::str::contains("MISSING_DEPENDENCY"));
}
