//! Daemon error taxonomy.

use crate::platform::DetectionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reason code attached to a terminal `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No display server could be determined
    DetectionError,
    /// The display never became ready
    DisplayUnavailable,
    /// The engine kept crashing
    CrashLoopDetected,
    /// The engine could not be spawned, repeatedly
    EngineLaunchError,
}

impl FailureReason {
    /// Stable code for scripts and status files.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DetectionError => "detection_error",
            Self::DisplayUnavailable => "display_unavailable",
            Self::CrashLoopDetected => "crash_loop_detected",
            Self::EngineLaunchError => "engine_launch_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors raised by the session daemon.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DaemonError {
    /// Display server detection failed
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// A rule failed syntactic validation
    #[error("invalid rules: {0}")]
    InvalidRule(String),

    /// The display server never became ready
    #[error("display server not ready after {attempts} attempts")]
    DisplayUnavailable {
        /// Readiness checks performed
        attempts: u32,
    },

    /// The engine exceeded its restart budget
    #[error("engine failed {failures} times within {window_secs}s, giving up")]
    CrashLoopDetected {
        /// Failures counted in the window
        failures: u32,
        /// Window length in seconds
        window_secs: u64,
    },

    /// The engine process could not be started
    #[error("failed to launch engine: {0}")]
    EngineLaunch(String),

    /// The rule source could not be read
    #[error("failed to load rules: {0}")]
    RuleSource(String),

    /// The compiled artifact could not be written
    #[error("failed to write compiled configuration: {0}")]
    Artifact(String),

    /// Another daemon instance holds the pid file
    #[error("daemon already running with pid {0}")]
    AlreadyRunning(i32),

    /// The runtime directory or pid file could not be prepared
    #[error("runtime directory unavailable: {0}")]
    RuntimeDir(String),

    /// The built-in key vocabulary could not be loaded
    #[error("key vocabulary unavailable: {0}")]
    Vocabulary(String),
}

impl DaemonError {
    /// Reason code if this error ends the daemon.
    #[must_use]
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Self::Detection(_) => Some(FailureReason::DetectionError),
            Self::DisplayUnavailable { .. } => Some(FailureReason::DisplayUnavailable),
            Self::CrashLoopDetected { .. } => Some(FailureReason::CrashLoopDetected),
            Self::EngineLaunch(_) => Some(FailureReason::EngineLaunchError),
            Self::InvalidRule(_)
            | Self::RuleSource(_)
            | Self::Artifact(_)
            | Self::AlreadyRunning(_)
            | Self::RuntimeDir(_)
            | Self::Vocabulary(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_codes() {
        assert_eq!(FailureReason::CrashLoopDetected.to_string(), "crash_loop_detected");
        assert_eq!(
            serde_json::to_string(&FailureReason::DisplayUnavailable).unwrap(),
            "\"display_unavailable\""
        );
    }

    #[test]
    fn test_recoverable_errors_have_no_reason() {
        assert_eq!(DaemonError::InvalidRule("x".to_string()).failure_reason(), None);
        assert_eq!(DaemonError::RuleSource("x".to_string()).failure_reason(), None);
        assert_eq!(DaemonError::Vocabulary("x".to_string()).failure_reason(), None);
        assert_eq!(
            DaemonError::DisplayUnavailable { attempts: 3 }.failure_reason(),
            Some(FailureReason::DisplayUnavailable)
        );
    }
}
