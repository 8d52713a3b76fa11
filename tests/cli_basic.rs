//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, each subcommand
//! responds to `--help`, and the offline `plan` command lays text out.

#![allow(deprecated)] // cargo_bin deprecation; replacement not yet stable

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `promoreel` binary with a clean environment.
fn promoreel() -> Command {
    let mut cmd = Command::cargo_bin("promoreel").expect("binary 'promoreel' should be built");
    for var in [
        "VIDEO_PERCENTAGE",
        "MIN_VIDEO_DURATION",
        "MAX_VIDEO_DURATION",
        "OPENAI_API_KEY",
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_USER_ID",
        "GOOGLE_DRIVE_FOLDER_ID",
        "GOOGLE_ACCESS_TOKEN",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// Write a config file into a fresh temp dir and return its path.
fn temp_config(contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("promoreel-cli-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    promoreel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: promoreel"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("schedule"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("decisions"));
}

#[test]
fn version_flag_shows_semver() {
    promoreel()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^promoreel \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_subcommand_is_an_error() {
    promoreel()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn unknown_subcommand_is_an_error() {
    promoreel().arg("publish").assert().failure();
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn run_help_lists_seed_and_json() {
    promoreel()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--seed"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn schedule_help_shows_default_time() {
    promoreel()
        .args(["schedule", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--at"))
        .stdout(predicate::str::contains("09:00"));
}

#[test]
fn plan_help_lists_frame_options() {
    promoreel()
        .args(["plan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--width"))
        .stdout(predicate::str::contains("--height"))
        .stdout(predicate::str::contains("--style"));
}

// ─── plan ────────────────────────────────────────────────────────────────────

#[test]
fn plan_prints_wrapped_lines() {
    let config = temp_config("");
    promoreel()
        .args(["--config"])
        .arg(&config)
        .args([
            "plan",
            "Morning coffee on the terrace overlooking the old town",
            "--width",
            "1080",
            "--height",
            "1920",
            "--seed",
            "7",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Morning"))
        .stdout(predicate::str::contains("town"))
        .stderr(predicate::str::contains("1080x1920"));
}

#[test]
fn plan_json_is_parseable() {
    let config = temp_config("");
    let output = promoreel()
        .arg("--config")
        .arg(&config)
        .args(["plan", "Sea view", "--seed", "1", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["text"], "Sea view");
    assert_eq!(plan["wrapped_lines"][0], "Sea view");
}

#[test]
fn plan_with_same_seed_is_reproducible() {
    let config = temp_config("");
    let run = || {
        promoreel()
            .arg("--config")
            .arg(&config)
            .args(["plan", "Breakfast included", "--seed", "42", "--json"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn plan_rejects_empty_text() {
    let config = temp_config("");
    promoreel()
        .arg("--config")
        .arg(&config)
        .args(["plan", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[invalid-input]"));
}

// ─── Configuration errors ────────────────────────────────────────────────────

#[test]
fn missing_explicit_config_is_reported() {
    promoreel()
        .args(["--config", "/nonexistent/promoreel.toml", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[configuration]"));
}

#[test]
fn invalid_percentage_is_a_configuration_error() {
    let config = temp_config("[run]\nvideo_percentage = 150\ncarousel_percentage = 0\n");
    promoreel()
        .arg("--config")
        .arg(&config)
        .args(["plan", "Hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[configuration]"));
}

#[test]
fn decisions_without_telegram_credentials_fails() {
    let config = temp_config("");
    promoreel()
        .arg("--config")
        .arg(&config)
        .arg("decisions")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[configuration]"));
}
