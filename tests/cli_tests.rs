//! CLI smoke tests: argument surface, the enabled gate, and structured
//! output.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn scout() -> Command {
    cargo_bin_cmd!("scout")
}

fn enabled_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("scout.toml"),
        "[tools.recruiting]\nenabled = true\n",
    )
    .unwrap();
    dir
}

#[test]
fn help_and_version_succeed() {
    scout().arg("--help").assert().success();
    scout().arg("--version").assert().success();
    scout().args(["recruiting", "--help"]).assert().success();
}

#[test]
fn disabled_pipeline_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    scout()
        .current_dir(dir.path())
        .args(["recruiting", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("disabled"));
}

#[test]
fn config_validate_works_while_disabled() {
    let dir = TempDir::new().unwrap();
    scout()
        .current_dir(dir.path())
        .args(["recruiting", "config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn status_lists_nothing_on_a_fresh_store() {
    let dir = enabled_project();
    scout()
        .current_dir(dir.path())
        .args(["recruiting", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no runs yet"));
}

#[test]
fn status_json_emits_json() {
    let dir = enabled_project();
    scout()
        .current_dir(dir.path())
        .args(["recruiting", "status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn run_without_providers_reports_a_failed_run() {
    let dir = enabled_project();
    // Preflight fails against the unconfigured LinkedIn client; the run is
    // recorded as failed and reported as structured output, not a crash.
    scout()
        .current_dir(dir.path())
        .args([
            "recruiting",
            "run",
            "--role-key",
            "founding-engineer",
            "--role-title",
            "Founding Engineer",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"failed\""));

    // The failed run is visible in status output afterwards.
    scout()
        .current_dir(dir.path())
        .args(["recruiting", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[failed]"));
}

#[test]
fn unknown_run_id_exits_nonzero() {
    let dir = enabled_project();
    scout()
        .current_dir(dir.path())
        .args(["recruiting", "results", "--run-id", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn bad_enum_argument_exits_nonzero() {
    let dir = enabled_project();
    scout()
        .current_dir(dir.path())
        .args([
            "recruiting",
            "run",
            "--role-key",
            "k",
            "--role-title",
            "t",
            "--source-query-mode",
            "wide",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid source query mode"));
}
