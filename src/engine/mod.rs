//! Remapping engine processes.
//!
//! The daemon only sees the engine through [`EngineLauncher`]: it hands over
//! a [`LaunchSpec`] and gets back an [`EngineHandle`] whose exit is observed
//! asynchronously, so the control loop never blocks on the child.
//!
//! [`ScriptedLauncher`] is a public stand-in engine. `macmap run --dry-run`
//! uses it, and it backs the daemon tests.

mod process;
mod scripted;

pub use process::ProcessLauncher;
pub use scripted::{ScriptedBehavior, ScriptedLauncher};

use crate::config::EngineConfig;
use crate::constants::{ENV_ARCH, ENV_COMPOSITOR, ENV_DESKTOP, ENV_SESSION_TYPE};
use crate::error::DaemonError;
use crate::platform::PlatformFacts;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::path::Path;
use tokio::sync::oneshot;

/// Everything needed to start the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable
    pub program: String,
    /// Full argument list, artifact path included
    pub args: Vec<String>,
    /// Variables added to the inherited environment
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    /// Builds `<program> <args...> <config_flag> <artifact>` with the session
    /// facts exported in the environment.
    #[must_use]
    pub fn new(engine: &EngineConfig, artifact: &Path, facts: &PlatformFacts) -> Self {
        let mut args = engine.args.clone();
        args.push(engine.config_flag.clone());
        args.push(artifact.display().to_string());

        let env = vec![
            (ENV_SESSION_TYPE.to_string(), facts.display_server.to_string()),
            (ENV_COMPOSITOR.to_string(), facts.compositor.clone()),
            (ENV_DESKTOP.to_string(), facts.desktop_environment.clone()),
            (ENV_ARCH.to_string(), facts.architecture.to_string()),
            ("XDG_SESSION_TYPE".to_string(), facts.display_server.to_string()),
        ];

        Self {
            program: engine.program.clone(),
            args,
            env,
        }
    }

    /// Value of an exported variable.
    #[must_use]
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// How an engine process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineExit {
    /// Normal exit with a status code
    Code(i32),
    /// Terminated by a signal
    Signal(i32),
    /// Exit status could not be read
    Unknown,
}

impl EngineExit {
    /// Exit code, if the process exited normally.
    #[must_use]
    pub const fn code(self) -> Option<i32> {
        match self {
            Self::Code(code) => Some(code),
            _ => None,
        }
    }

    /// True for a clean `exit(0)`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl fmt::Display for EngineExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal(sig) => write!(f, "signal {sig}"),
            Self::Unknown => write!(f, "unknown exit status"),
        }
    }
}

/// Delivers stop requests to a running engine.
pub trait EngineSignaller: Send + Sync {
    /// Graceful stop request (SIGTERM).
    fn terminate(&self) -> io::Result<()>;

    /// Forced stop (SIGKILL).
    fn kill(&self) -> io::Result<()>;
}

/// A started engine.
pub struct EngineHandle {
    /// OS process id, when there is one
    pub pid: Option<u32>,
    /// Resolves once the process has exited
    pub exit: oneshot::Receiver<EngineExit>,
    signaller: Box<dyn EngineSignaller>,
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Wraps an exit receiver and a signaller.
    pub fn new(
        pid: Option<u32>,
        exit: oneshot::Receiver<EngineExit>,
        signaller: impl EngineSignaller + 'static,
    ) -> Self {
        Self {
            pid,
            exit,
            signaller: Box::new(signaller),
        }
    }

    /// Asks the engine to stop.
    pub fn terminate(&self) -> io::Result<()> {
        self.signaller.terminate()
    }

    /// Forces the engine to stop.
    pub fn kill(&self) -> io::Result<()> {
        self.signaller.kill()
    }
}

/// Starts engine processes.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Runs once per session before the first launch. Best effort: problems
    /// are logged, never fatal.
    async fn prepare(&self, _facts: &PlatformFacts) {}

    /// Spawns the engine. Must be called inside a tokio runtime.
    fn launch(&self, spec: &LaunchSpec) -> Result<EngineHandle, DaemonError>;
}
