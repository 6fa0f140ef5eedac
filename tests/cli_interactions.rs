//! CLI behaviour tests
//!
//! Every test runs the binary in its own temporary directory so the .env
//! file, database and log file of one test never leak into another.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const MANAGED_VARS: &[&str] = &[
    "REAL_RUN",
    "RUN_DOWNLOAD",
    "RUN_UPLOAD",
    "RUN_IMAGE",
    "PLACEHOLDER_SET",
    "DOWNLOAD_THRESHOLD",
    "THRESHOLD_MODE",
    "GMAIL_SENDER_EMAIL",
    "GMAIL_SENDER_PASSWORD",
    "GMAIL_RECIPIENT_EMAIL",
    "SMTP_HOST",
    "SMTP_PORT",
    "DEBUG_SMTP_HOST",
    "DEBUG_SMTP_PORT",
    "DATABASE_PATH",
    "STORAGE_FORMAT",
    "LOG_FILE",
    "LOG_LEVEL",
    "SERVER_IDS",
    "PROVIDER_TIMEOUT_SECONDS",
    "PARALLEL_REQUESTS",
    "ENABLE_COLOR",
];

/// Command rooted in `dir` with a clean view of the supported variables
fn speedmon(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("speedmon").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1");
    for var in MANAGED_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn dry_run(dir: &Path) -> Command {
    let mut cmd = speedmon(dir);
    cmd.arg("--dry-run")
        .arg("--database")
        .arg(dir.join("results.db"))
        .arg("--log-file")
        .arg(dir.join("speedtest_app.log"));
    cmd
}

#[test]
fn test_dry_run_records_placeholder_result() {
    let temp = TempDir::new().unwrap();

    dry_run(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Speedtest Results"))
        .stdout(predicate::str::contains("88.63 MB/s"))
        .stdout(predicate::str::contains("10.86 MB/s"))
        .stdout(predicate::str::contains("14.582 ms"))
        .stdout(predicate::str::contains("Stored: row 1"))
        .stdout(predicate::str::contains("Notification: not needed"));

    assert!(temp.path().join("results.db").exists());

    let log = fs::read_to_string(temp.path().join("speedtest_app.log")).unwrap();
    let line = Regex::new(r"(?m)^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}:DEBUG:").unwrap();
    assert!(line.is_match(&log), "unexpected log format:\n{}", log);
    assert!(log.contains("Insert successful"));
}

#[test]
fn test_dry_run_then_history() {
    let temp = TempDir::new().unwrap();

    dry_run(temp.path()).assert().success();
    dry_run(temp.path()).assert().success();

    speedmon(temp.path())
        .arg("--database")
        .arg(temp.path().join("results.db"))
        .arg("--history")
        .arg("5")
        .assert()
        .success()
        .stdout(predicate::str::contains("Last 2 results"))
        .stdout(predicate::str::contains("test run"))
        .stdout(predicate::str::contains("88.63 MB/s"));
}

#[test]
fn test_history_on_empty_database() {
    let temp = TempDir::new().unwrap();

    speedmon(temp.path())
        .arg("--database")
        .arg(temp.path().join("empty.db"))
        .arg("--history")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored results"));
}

#[test]
fn test_raw_storage_format_and_round_placeholders() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".env"), "PLACEHOLDER_SET=round\nSTORAGE_FORMAT=raw\n").unwrap();

    dry_run(temp.path())
        .arg("--threshold")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("999.0 B/s"))
        .stdout(predicate::str::contains("0 ms"));

    speedmon(temp.path())
        .arg("--database")
        .arg(temp.path().join("results.db"))
        .arg("--history")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("999"))
        .stdout(predicate::str::contains("B/s").not());
}

#[test]
fn test_threshold_hit_without_mail_server_fails_with_reporting_code() {
    let temp = TempDir::new().unwrap();
    // Nothing listens on port 1, so the notification step fails
    fs::write(temp.path().join(".env"), "DEBUG_SMTP_PORT=1\n").unwrap();

    dry_run(temp.path())
        .arg("--threshold")
        .arg("100")
        .assert()
        .code(8)
        .stdout(predicate::str::contains("Stored: row 1"))
        .stdout(predicate::str::contains("HIT (88.63 <= 100)"))
        .stderr(predicate::str::contains("[REPORT]"));

    assert!(temp.path().join("results.db").exists());
}

#[test]
fn test_init_env_writes_example() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("example.env");

    speedmon(temp.path())
        .arg("--init-env")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::contains("Example environment file written"));

    let content = fs::read_to_string(&target).unwrap();
    assert!(content.contains("# REAL_RUN="));
    assert!(content.contains("DOWNLOAD_THRESHOLD"));
    assert!(content.contains("GMAIL_SENDER_PASSWORD"));
}

#[test]
fn test_init_env_rejects_directory() {
    let temp = TempDir::new().unwrap();

    speedmon(temp.path())
        .arg("--init-env")
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is a directory"));
}

#[test]
fn test_env_help_lists_variables() {
    let temp = TempDir::new().unwrap();

    speedmon(temp.path())
        .arg("--env-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supported Environment Variables"))
        .stdout(predicate::str::contains("THRESHOLD_MODE"))
        .stdout(predicate::str::contains("Configuration Priority"));
}

#[test]
fn test_conflicting_flags_exit_with_usage_code() {
    let temp = TempDir::new().unwrap();

    speedmon(temp.path())
        .args(["--real-run", "--dry-run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--real-run and --dry-run"));

    speedmon(temp.path())
        .args(["--history", "2", "--env-help"])
        .assert()
        .code(1);

    speedmon(temp.path())
        .args(["--color", "--no-color"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_argument_values() {
    let temp = TempDir::new().unwrap();

    speedmon(temp.path())
        .arg("--threshold=-5")
        .assert()
        .failure()
        .stderr(predicate::str::contains("threshold"));

    speedmon(temp.path())
        .args(["--threshold-mode", "furlongs"])
        .assert()
        .failure();

    speedmon(temp.path())
        .args(["--history", "0"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_env_value_is_config_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".env"), "PARALLEL_REQUESTS=many\n").unwrap();

    dry_run(temp.path())
        .assert()
        .code(1);
}

#[test]
fn test_version_and_help() {
    let temp = TempDir::new().unwrap();

    speedmon(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));

    speedmon(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--real-run"))
        .stdout(predicate::str::contains("--history"));
}
