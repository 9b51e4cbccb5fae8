//! Shared test fixtures for integration tests.
#![allow(dead_code)] // Each test binary uses a different subset

use macmap::config::Config;
use macmap::models::{Action, AppMatcher, BindingRule, FunctionCall, Layer, Predicate, RuleSet};
use macmap::platform::{PlatformFacts, PlatformDetector, StaticEnvironment};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// X11 session under KDE with the local display socket present.
pub fn x11_env() -> StaticEnvironment {
    StaticEnvironment::new("x86_64")
        .with_var("XDG_SESSION_TYPE", "x11")
        .with_var("DISPLAY", ":0")
        .with_var("XDG_CURRENT_DESKTOP", "KDE")
        .with_path("/tmp/.X11-unix/X0")
}

/// Wayland session under GNOME with the compositor socket present.
pub fn wayland_env() -> StaticEnvironment {
    StaticEnvironment::new("aarch64")
        .with_var("XDG_SESSION_TYPE", "wayland")
        .with_var("WAYLAND_DISPLAY", "wayland-0")
        .with_var("XDG_RUNTIME_DIR", "/run/user/1000")
        .with_var("XDG_CURRENT_DESKTOP", "GNOME")
        .with_path("/run/user/1000/wayland-0")
}

/// Facts for [`x11_env`].
pub fn x11_facts() -> PlatformFacts {
    PlatformDetector::new(x11_env()).detect().unwrap()
}

/// Facts for [`wayland_env`].
pub fn wayland_facts() -> PlatformFacts {
    PlatformDetector::new(wayland_env()).detect().unwrap()
}

/// Base layer plus one Firefox layer mapping Cmd+T to Ctrl+T.
pub fn firefox_rules() -> RuleSet {
    let mut rules = RuleSet::new(true);
    rules
        .add_application_layer(
            Layer::application("Firefox").with_rule(BindingRule::new("Cmd+T", "Ctrl+T")),
        )
        .unwrap();
    rules
}

/// A rule set touching every layer kind and action form.
pub fn full_rules() -> RuleSet {
    let mut rules = RuleSet::new(true);
    rules
        .add_application_layer(
            Layer::application("Firefox")
                .with_rule(BindingRule::new("Cmd+T", "Ctrl+T"))
                .with_rule(BindingRule::with_action(
                    "Cmd+Shift+K",
                    Action::Sequence(vec!["Ctrl+K".to_string(), "Ctrl+U".to_string()]),
                )),
        )
        .unwrap();
    rules
        .add_application_layer(
            Layer::application("Terminals")
                .matching(AppMatcher::Pattern("(?i)(kitty|alacritty)".to_string()))
                .with_rule(BindingRule::new("Cmd+C", "Ctrl+Shift+C"))
                .with_rule(
                    BindingRule::with_action(
                        "Cmd+Y",
                        Action::Call(FunctionCall::Text("hello".to_string())),
                    )
                    .when(Predicate::Hours { from: 9, to: 17 }),
                ),
        )
        .unwrap();
    rules
        .add_conditional_layer(
            Layer::conditional("Docs", Predicate::WindowTitle("Manual".to_string()))
                .with_rule(BindingRule::new("Cmd+F", "Ctrl+F")),
        )
        .unwrap();
    rules.global_layer.add_rule(BindingRule::with_action(
        "Cmd+Space",
        Action::Call(FunctionCall::Launch(vec![
            "rofi".to_string(),
            "-show".to_string(),
            "drun".to_string(),
        ])),
    ));
    rules.raw_appendix = "# user tail\nprint(\"loaded\")\n".to_string();
    rules
}

/// Rules file contents equivalent to [`firefox_rules`].
pub const FIREFOX_RULES_TOML: &str = r#"
[[application]]
name = "Firefox"
bindings = [
  { trigger = "Cmd+T", action = "Ctrl+T" },
]
"#;

/// Rules file with one unknown trigger token and one bad output.
pub const INVALID_RULES_TOML: &str = r#"
[[application]]
name = "Firefox"
bindings = [
  { trigger = "Cmd+Banana", action = "Ctrl+T" },
  { trigger = "Cmd+W", action = "Ctrl+Nope" },
]
"#;

/// Writes `content` to `rules.toml` in a fresh temp dir.
pub fn write_rules_file(content: &str) -> (PathBuf, TempDir) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rules.toml");
    fs::write(&path, content).unwrap();
    (path, dir)
}

/// Settings with short timings and the runtime dir in `runtime_dir`.
pub fn fast_config(runtime_dir: &Path) -> Config {
    let mut config = Config::new();
    config.paths.runtime_dir = Some(runtime_dir.to_path_buf());
    config.daemon.display_max_attempts = 4;
    config.daemon.display_initial_backoff_ms = 100;
    config.daemon.display_max_backoff_ms = 400;
    config.daemon.startup_grace_ms = 200;
    config.daemon.max_restarts = 3;
    config.daemon.restart_window_secs = 60;
    config.daemon.restart_backoff_ms = 100;
    config.daemon.restart_backoff_max_ms = 1000;
    config.daemon.stop_grace_ms = 1000;
    config.daemon.kill_wait_ms = 500;
    config.daemon.watch_rules = false;
    config.daemon.watch_debounce_ms = 50;
    config.daemon.rules_retry_ms = 1000;
    config
}
