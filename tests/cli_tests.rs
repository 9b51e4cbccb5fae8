//! End-to-end tests for the `macmap` binary.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

mod fixtures;
use fixtures::*;

/// Path to the macmap binary
fn macmap_bin() -> &'static str {
    env!("CARGO_BIN_EXE_macmap")
}

/// Runs macmap with a settings file that does not exist, so defaults apply.
fn run(args: &[&str], scratch: &Path) -> Output {
    let config = scratch.join("config.toml");
    Command::new(macmap_bin())
        .args(args)
        .args(["--config", config.to_str().unwrap()])
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command")
}

#[test]
fn test_validate_valid_rules() {
    let (rules, dir) = write_rules_file(FIREFOX_RULES_TOML);
    let output = run(&["validate", "--rules", rules.to_str().unwrap()], dir.path());

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("passed"), "stdout: {stdout}");
}

#[test]
fn test_validate_invalid_rules_json() {
    let (rules, dir) = write_rules_file(INVALID_RULES_TOML);
    let output = run(
        &["validate", "--rules", rules.to_str().unwrap(), "--json"],
        dir.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let result: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Should parse JSON output");
    assert_eq!(result["valid"], false);
    assert_eq!(result["rules"], 2);

    let errors = result["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["location"]["layer"], "Firefox");
    assert_eq!(errors[0]["location"]["rule"], 1);
    assert_eq!(errors[0]["location"]["trigger"], "Cmd+Banana");
    assert_eq!(errors[1]["location"]["rule"], 2);
}

#[test]
fn test_validate_malformed_file() {
    let (rules, dir) = write_rules_file("[[application]\nname = ");
    let output = run(
        &["validate", "--rules", rules.to_str().unwrap(), "--json"],
        dir.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["valid"], false);
}

#[test]
fn test_validate_missing_explicit_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    let output = run(&["validate", "--rules", missing.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_compile_to_stdout() {
    let (rules, dir) = write_rules_file(FIREFOX_RULES_TOML);
    let output = run(
        &["compile", "--rules", rules.to_str().unwrap(), "--session", "x11"],
        dir.path(),
    );

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SESSION_TYPE = \"x11\""));
    assert!(stdout.contains("keymap(\"App: Firefox\", {"));
    assert!(stdout.contains("C(\"Super-t\"): C(\"C-t\"),"));
}

#[test]
fn test_compile_digest_is_stable() {
    let (rules, dir) = write_rules_file(FIREFOX_RULES_TOML);
    let args = [
        "compile",
        "--rules",
        rules.to_str().unwrap(),
        "--session",
        "wayland",
        "--print-digest",
    ];

    let first = run(&args, dir.path());
    let second = run(&args, dir.path());
    assert_eq!(first.status.code(), Some(0));

    let digest = String::from_utf8_lossy(&first.stdout).trim().to_string();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_compile_to_file() {
    let (rules, dir) = write_rules_file(FIREFOX_RULES_TOML);
    let out = dir.path().join("out").join("config.py");
    let output = run(
        &[
            "compile",
            "--rules",
            rules.to_str().unwrap(),
            "--session",
            "x11",
            "--output",
            out.to_str().unwrap(),
        ],
        dir.path(),
    );

    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("keymap(\"App: Firefox\""));
}

#[test]
fn test_compile_invalid_rules() {
    let (rules, dir) = write_rules_file(INVALID_RULES_TOML);
    let output = run(
        &["compile", "--rules", rules.to_str().unwrap(), "--session", "x11"],
        dir.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Cmd+Banana"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_detect_forced_session_json() {
    let output = Command::new(macmap_bin())
        .args(["detect", "--session", "wayland", "--json"])
        .env("XDG_CURRENT_DESKTOP", "Hyprland")
        .env("HYPRLAND_INSTANCE_SIGNATURE", "abc")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(0));
    let facts: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(facts["display_server"], "wayland");
    assert_eq!(facts["desktop_environment"], "hyprland");
    assert_eq!(facts["compositor"], "hyprland");
    assert!(facts["display_ready"].is_boolean());
}

#[test]
fn test_status_without_daemon() {
    let dir = TempDir::new().unwrap();
    let runtime = dir.path().join("run");
    let output = run(
        &["status", "--runtime-dir", runtime.to_str().unwrap()],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_stop_and_reload_without_daemon() {
    let dir = TempDir::new().unwrap();
    let runtime = dir.path().join("run");

    for command in ["stop", "reload"] {
        let output = run(
            &[command, "--runtime-dir", runtime.to_str().unwrap()],
            dir.path(),
        );
        assert_eq!(output.status.code(), Some(3), "{command} should report no daemon");
    }
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(macmap_bin())
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "stop", "reload", "status", "compile", "validate", "detect"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_run_dry_run_until_stopped() {
    let (rules, dir) = write_rules_file(FIREFOX_RULES_TOML);
    let runtime = dir.path().join("run");
    let config = dir.path().join("config.toml");

    let mut daemon = Command::new(macmap_bin())
        .args(["run", "--dry-run", "--no-watch"])
        .args(["--rules", rules.to_str().unwrap()])
        .args(["--runtime-dir", runtime.to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .env_remove("RUST_LOG")
        .env_remove("WAYLAND_DISPLAY")
        .env_remove("XDG_SESSION_TYPE")
        .env("DISPLAY", "remote.example:0")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .expect("Failed to start daemon");

    let status_path = runtime.join("status.json");
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
    let mut running = false;
    while std::time::Instant::now() < deadline {
        if let Ok(text) = std::fs::read_to_string(&status_path) {
            if let Ok(status) = serde_json::from_str::<serde_json::Value>(&text) {
                if status["state"] == "running" {
                    running = true;
                    break;
                }
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    if !running {
        let _ = daemon.kill();
    }
    assert!(running, "daemon never reported running");
    assert!(runtime.join("config.py").exists());

    let output = run(
        &["stop", "--wait", "--runtime-dir", runtime.to_str().unwrap()],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(daemon.wait().unwrap().code(), Some(0));
}
