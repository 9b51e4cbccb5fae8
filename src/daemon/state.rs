//! Daemon and engine state, and the read-only status snapshot.

use crate::error::FailureReason;
use crate::platform::PlatformFacts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Session daemon state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    /// Created, not started
    Idle,
    /// Detecting the platform and polling display readiness
    WaitingForDisplay,
    /// Loading rules and compiling the artifact
    Compiling,
    /// Spawning the engine
    Launching,
    /// Engine up and supervised
    Running,
    /// Waiting to relaunch the engine
    Restarting,
    /// Stopping the engine
    ShuttingDown,
    /// Finished cleanly
    Stopped,
    /// Finished with a fatal error
    Failed(FailureReason),
}

impl DaemonState {
    /// True for `Stopped` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed(_))
    }
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::WaitingForDisplay => write!(f, "Waiting for display"),
            Self::Compiling => write!(f, "Compiling"),
            Self::Launching => write!(f, "Launching"),
            Self::Running => write!(f, "Running"),
            Self::Restarting => write!(f, "Restarting"),
            Self::ShuttingDown => write!(f, "Shutting down"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed(reason) => write!(f, "Failed ({reason})"),
        }
    }
}

/// Lifecycle of the current engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No process yet
    #[default]
    NotStarted,
    /// Spawned, inside the startup grace window
    Starting,
    /// Past the grace window
    Running,
    /// Stop requested
    Stopping,
    /// Exited after a stop request or a clean exit
    Stopped,
    /// Exited unexpectedly or failed to spawn
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Engine process bookkeeping, owned by the control loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EngineProcessState {
    /// Lifecycle state
    pub state: EngineState,
    /// OS pid of the current process
    pub pid: Option<u32>,
    /// When the current process was spawned
    pub started_at: Option<DateTime<Utc>>,
    /// Relaunches since the daemon started
    pub restart_count: u32,
    /// Exit code of the previous process, if it exited normally
    pub last_exit_code: Option<i32>,
}

/// Point-in-time copy of the daemon's state for external readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Daemon state
    pub state: DaemonState,
    /// Engine process
    pub engine: EngineProcessState,
    /// Digest of the artifact in effect
    pub artifact_digest: Option<String>,
    /// Where the artifact is written
    pub artifact_path: PathBuf,
    /// Detected platform, once known
    pub facts: Option<PlatformFacts>,
    /// Most recent error, recoverable or fatal
    pub last_error: Option<String>,
    /// Where rules are read from
    pub rules_source: String,
    /// Daemon process id
    pub daemon_pid: u32,
    /// Time of this snapshot
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of a daemon that has not started.
    #[must_use]
    pub fn idle(artifact_path: PathBuf, rules_source: String) -> Self {
        Self {
            state: DaemonState::Idle,
            engine: EngineProcessState::default(),
            artifact_digest: None,
            artifact_path,
            facts: None,
            last_error: None,
            rules_source,
            daemon_pid: std::process::id(),
            updated_at: Utc::now(),
        }
    }
}
