//! Shared CLI types: errors, exit codes, JSON responses and lookups.

use crate::config::Config;
use crate::daemon::files;
use crate::platform::{DisplayServer, ForcedSession, PlatformDetector, SystemEnvironment};
use crate::store::TomlRuleStore;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded
    Success = 0,
    /// Invalid rules, configuration or arguments
    ValidationError = 1,
    /// File system or process I/O failed
    IoError = 2,
    /// No daemon is running
    NotRunning = 3,
    /// The daemon ended in `Failed`
    DaemonFailed = 4,
}

impl ExitCode {
    /// Numeric code for `std::process::exit`.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Error returned by command handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    /// Exit code to terminate with
    pub kind: ExitCode,
    /// Message printed to stderr
    pub message: String,
}

impl CliError {
    /// Validation failure (exit 1).
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ExitCode::ValidationError,
            message: message.into(),
        }
    }

    /// I/O failure (exit 2).
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: ExitCode::IoError,
            message: message.into(),
        }
    }

    /// No daemon to talk to (exit 3).
    pub fn not_running(message: impl Into<String>) -> Self {
        Self {
            kind: ExitCode::NotRunning,
            message: message.into(),
        }
    }

    /// The daemon failed (exit 4).
    pub fn daemon_failed(message: impl Into<String>) -> Self {
        Self {
            kind: ExitCode::DaemonFailed,
            message: message.into(),
        }
    }

    /// Exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.kind.code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for command handlers.
pub type CliResult<T> = Result<T, CliError>;

/// JSON output of `validate`.
#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    /// True when no rule has an error
    pub valid: bool,
    /// Number of user rules checked
    pub rules: usize,
    /// Errors and warnings
    pub errors: Vec<ValidationMessage>,
}

/// One error or warning.
#[derive(Debug, Serialize)]
pub struct ValidationMessage {
    /// "error" or "warning"
    pub severity: String,
    /// Human-readable message
    pub message: String,
    /// Where the problem is, when it belongs to a rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ValidationLocation>,
}

/// Rule position of a message.
#[derive(Debug, Serialize)]
pub struct ValidationLocation {
    /// Layer name
    pub layer: String,
    /// 1-based rule index within the layer
    pub rule: usize,
    /// Trigger as written
    pub trigger: String,
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("Failed to serialize JSON: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Options locating the daemon's settings and runtime directory.
#[derive(Debug, Clone, Default, Args)]
pub struct DaemonLocation {
    /// Settings file (default: ~/.config/macmap/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Runtime directory holding the pid and status files
    #[arg(long, value_name = "DIR")]
    pub runtime_dir: Option<PathBuf>,
}

impl DaemonLocation {
    /// Loads settings, applying the runtime directory override.
    pub fn load_config(&self) -> CliResult<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
        .map_err(|e| CliError::validation(format!("Failed to load configuration: {e:#}")))?;

        if let Some(dir) = &self.runtime_dir {
            config.paths.runtime_dir = Some(dir.clone());
        }
        Ok(config)
    }

    /// Pid of the running daemon.
    pub fn running_pid(&self) -> CliResult<(i32, PathBuf)> {
        let runtime_dir = self.load_config()?.paths.resolved_runtime_dir();
        match files::running_daemon(&runtime_dir) {
            Some(pid) => Ok((pid, runtime_dir)),
            None => Err(CliError::not_running(format!(
                "No daemon running (runtime dir: {})",
                runtime_dir.display()
            ))),
        }
    }
}

/// Rules file store: the explicit path, else the configured or default one.
pub fn rule_store(config: &Config, rules: Option<&Path>) -> CliResult<TomlRuleStore> {
    TomlRuleStore::locate(rules.or(config.paths.rules_file.as_deref()))
        .map_err(|e| CliError::io(format!("Failed to locate rules file: {e:#}")))
}

/// Display server chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionArg {
    /// X11 session
    X11,
    /// Wayland session
    Wayland,
}

/// Detector over the real environment, optionally forcing the display server.
#[must_use]
pub fn detector(session: Option<SessionArg>) -> PlatformDetector {
    match session {
        None => PlatformDetector::system(),
        Some(SessionArg::X11) => {
            PlatformDetector::new(ForcedSession::new(SystemEnvironment, DisplayServer::X11))
        }
        Some(SessionArg::Wayland) => {
            PlatformDetector::new(ForcedSession::new(SystemEnvironment, DisplayServer::Wayland))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::validation("x").exit_code(), 1);
        assert_eq!(CliError::io("x").exit_code(), 2);
        assert_eq!(CliError::not_running("x").exit_code(), 3);
        assert_eq!(CliError::daemon_failed("x").exit_code(), 4);
        assert_eq!(ExitCode::Success.code(), 0);
    }
}
