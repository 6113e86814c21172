//! Integration tests for the `warden` binary entry point.
//!
//! Each test points the binary at a temporary deployment through `WARDEN_*`
//! variables and tags unique to that deployment, so no real worker is touched.

use std::fs;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

fn warden(root: &TempDir) -> Command {
    let tag = format!("{}/", root.path().display());
    let mut command = cargo_bin_cmd!("warden");
    command
        .env("WARDEN_WORKER_ROOT", root.path())
        .env("WARDEN_PROCESS_TAG", &tag)
        .env("WARDEN_ENTRY_TAG", &tag)
        .env("WARDEN_RECOVERY_TAG", &tag)
        .env("WARDEN_LOG_FILTER", "warn");
    command
}

fn deployment() -> anyhow::Result<TempDir> {
    let root = TempDir::new()?;
    fs::create_dir_all(root.path().join("backend/get_jobs"))?;
    Ok(root)
}

#[test]
fn missing_subcommand_exits_with_failure() {
    let mut command = cargo_bin_cmd!("warden");
    command.assert().failure().stderr(contains("Usage"));
}

#[test]
fn stop_reports_when_nothing_runs() -> anyhow::Result<()> {
    let root = deployment()?;
    warden(&root)
        .arg("stop")
        .assert()
        .success()
        .stdout(contains("no worker processes running"));
    Ok(())
}

#[test]
fn status_exits_nonzero_when_the_worker_is_absent() -> anyhow::Result<()> {
    let root = deployment()?;
    warden(&root)
        .args(["status", "--strict"])
        .assert()
        .code(1)
        .stdout(contains("process not running"));
    Ok(())
}

#[test]
fn logs_honours_the_line_count() -> anyhow::Result<()> {
    let root = deployment()?;
    fs::create_dir_all(root.path().join("logs"))?;
    fs::write(root.path().join("logs/backend.log"), "a\nb\nc\n")?;
    warden(&root)
        .args(["logs", "--lines", "1"])
        .assert()
        .success()
        .stdout("c\n");
    Ok(())
}

#[test]
fn config_flags_precede_the_command() -> anyhow::Result<()> {
    let root = deployment()?;
    warden(&root)
        .args(["--log-file", "session.log", "logs"])
        .assert()
        .failure()
        .stderr(contains("session.log"));
    Ok(())
}

#[test]
fn missing_worker_root_is_an_environment_error() -> anyhow::Result<()> {
    let root = TempDir::new()?;
    let absent = root.path().join("absent");
    warden(&root)
        .env("WARDEN_WORKER_ROOT", &absent)
        .arg("stop")
        .assert()
        .failure()
        .stderr(contains("does not exist"));
    Ok(())
}
