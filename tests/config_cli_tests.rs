//! Integration tests for configuration handling of the binary.
//!
//! These tests run the built executable with `--check-config` and
//! `--show-config` against temporary config files.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

/// Helper to get the binary path
fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_function-instance-control"))
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn yaml_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults_pass_check_config() {
    let output = run(&["--no-config", "--check-config"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Configuration is valid"));
}

#[test]
fn test_zero_pool_fails_check_config() {
    let file = yaml_file("max_concurrent_calls: 0\n");
    let path = file.path().to_string_lossy().to_string();

    let output = run(&["--config", &path, "--check-config"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("max_concurrent_calls must be greater than 0"),
        "unexpected stderr: '{}'",
        stderr
    );
}

#[test]
fn test_cli_overrides_config_file() {
    let file = yaml_file("port: 7000\ninstance_id: \"from-file\"\n");
    let path = file.path().to_string_lossy().to_string();

    let output = run(&[
        "--config",
        &path,
        "--port",
        "7100",
        "--show-config",
        "--config-format",
        "json",
    ]);
    assert!(output.status.success());

    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["port"], 7100);
    assert_eq!(shown["instance_id"], "from-file");
}

#[test]
fn test_invalid_log_level_fails_check_config() {
    let file = yaml_file("log_level: chatty\n");
    let path = file.path().to_string_lossy().to_string();

    let output = run(&["--config", &path, "--check-config"]);
    assert!(!output.status.success());
}

#[test]
fn test_missing_config_file_is_an_error() {
    let output = run(&["--config", "/nonexistent/control.yaml", "--check-config"]);
    assert!(!output.status.success());
}

#[test]
fn test_config_subcommand_writes_to_stdout() {
    let output = run(&["config", "--output", "-", "--commented"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("# Function Instance Control Configuration"));
    assert!(stdout.contains("port: 9093"));
}

#[test]
fn test_oversized_exception_history_fails_check_config() {
    let output = run(&[
        "--no-config",
        "--exception-history",
        "18446744073709551615",
        "--check-config",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("exception_history must be between 1 and"),
        "unexpected stderr: '{}'",
        stderr
    );
}
