/// Smoke tests to verify the binary runs without panicking
use std::process::Command;

#[test]
fn binary_shows_help() {
    let output = Command::new("cargo")
        .args(["run", "--", "--help"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(
        output.status.success(),
        "Binary failed to run --help: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("sensegrid"),
        "Help output should mention sensegrid"
    );
    assert!(
        stdout.contains("--preview"),
        "Help output should list the preview flag"
    );
}

#[test]
fn binary_shows_version() {
    let output = Command::new("cargo")
        .args(["run", "--", "--version"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(
        output.status.success(),
        "Binary failed to run --version: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn invalid_flag_fails_gracefully() {
    let output = Command::new("cargo")
        .args(["run", "--", "--no-such-flag"])
        .output()
        .expect("Failed to execute cargo run");

    // Should fail with error, not panic
    assert!(
        !output.status.success(),
        "Invalid flag should return error status"
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("panicked at"),
        "Invalid flag should not cause panic"
    );
}

#[test]
fn unreadable_config_fails_with_context() {
    let output = Command::new("cargo")
        .args(["run", "--", "--config", "/nonexistent/config.toml", "--headless"])
        .output()
        .expect("Failed to execute cargo run");

    assert!(
        !output.status.success(),
        "Missing explicit config should be an error"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("config"),
        "Error should mention the configuration"
    );
    assert!(!stderr.contains("panicked at"));
}
