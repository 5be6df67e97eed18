//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `kometa-ai` binary and verify exit
//! codes, stdout content, and stderr content. Tests that would reach the
//! network are kept out; these cover the offline modes and startup
//! validation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper: a command with the required credentials cleared.
fn kometa_ai() -> Command {
    let mut cmd = Command::cargo_bin("kometa-ai").expect("binary exists");
    cmd.env_remove("RADARR_URL")
        .env_remove("RADARR_API_KEY")
        .env_remove("CLAUDE_API_KEY")
        .env_remove("RUST_LOG")
        .env_remove("DEBUG_LOGGING");
    cmd
}

/// Helper: a command with fake credentials in a temp working directory.
fn configured(dir: &TempDir) -> Command {
    let mut cmd = kometa_ai();
    cmd.current_dir(dir.path())
        .env("RADARR_URL", "http://localhost:17878")
        .env("RADARR_API_KEY", "test-radarr-key")
        .env("CLAUDE_API_KEY", "test-claude-key");
    cmd
}

// ──────────────────────────────────────────────
// Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    kometa_ai()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Claude-driven collection tagging for Radarr",
        ));
}

#[test]
fn version_exits_0() {
    kometa_ai()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kometa-ai"));
}

// ──────────────────────────────────────────────
// Configuration validation
// ──────────────────────────────────────────────

#[test]
fn missing_config_exits_1() {
    let dir = TempDir::new().unwrap();
    kometa_ai()
        .current_dir(dir.path())
        .arg("--run-now")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_schedule_interval_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env("SCHEDULE_INTERVAL", "sometimes")
        .arg("--run-now")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn invalid_start_time_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env("SCHEDULE_START_TIME", "25:99")
        .arg("--run-now")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn dump_config_masks_secrets() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .arg("--dump-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("test-radarr-key").not())
        .stdout(predicate::str::contains("test-claude-key").not());
}

// ──────────────────────────────────────────────
// State management modes
// ──────────────────────────────────────────────

#[test]
fn dump_state_prints_empty_document() {
    let dir = TempDir::new().unwrap();
    kometa_ai()
        .current_dir(dir.path())
        .arg("--dump-state")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"state_format_version\": 1"))
        .stdout(predicate::str::contains("\"decisions\""));
}

#[test]
fn reset_state_creates_state_file() {
    let dir = TempDir::new().unwrap();
    kometa_ai()
        .current_dir(dir.path())
        .arg("--reset-state")
        .assert()
        .success();

    let state_file = dir.path().join("state").join("kometa_state.json");
    assert!(state_file.exists());
    let content = std::fs::read_to_string(state_file).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed["state_format_version"], 1);
}

#[test]
fn dump_state_roundtrips_reset_state() {
    let dir = TempDir::new().unwrap();
    kometa_ai()
        .current_dir(dir.path())
        .arg("--reset-state")
        .assert()
        .success();
    kometa_ai()
        .current_dir(dir.path())
        .arg("--dump-state")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"changes\": []"));
}

// ──────────────────────────────────────────────
// Email
// ──────────────────────────────────────────────

#[test]
fn send_test_email_without_smtp_exits_1() {
    let dir = TempDir::new().unwrap();
    configured(&dir)
        .env_remove("SMTP_SERVER")
        .env_remove("NOTIFICATION_RECIPIENTS")
        .arg("--send-test-email")
        .assert()
        .failure()
        .code(1);
}
