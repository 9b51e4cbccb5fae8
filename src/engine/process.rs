//! Real engine processes via `tokio::process`.

use super::{EngineExit, EngineHandle, EngineLauncher, EngineSignaller, LaunchSpec};
use crate::config::EngineConfig;
use crate::error::DaemonError;
use crate::platform::{DisplayServer, PlatformFacts};
use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Upper bound for `pgrep` and `xhost`.
const HELPER_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns the engine as a child process.
///
/// The child inherits stdout and stderr so its output lands in the same
/// journal as the daemon's. Before the first launch, leftover keymapper
/// processes are stopped and, on X11, local clients are granted access to
/// the X server.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    stale_processes: Vec<String>,
    x11_local_access: bool,
}

impl ProcessLauncher {
    /// Launcher using the pre-launch settings from `engine`.
    #[must_use]
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            stale_processes: engine.stale_processes.clone(),
            x11_local_access: engine.x11_local_access,
        }
    }

    /// SIGTERMs every process whose command line contains `bin/<name>`,
    /// except this one.
    async fn stop_stale(&self) {
        let own = std::process::id();
        for name in &self.stale_processes {
            let pattern = format!("bin/{name}");
            let Some(output) = run_helper("pgrep", &["-f", pattern.as_str()]).await else {
                continue;
            };
            for pid in parse_pids(&output.stdout) {
                if pid == own {
                    continue;
                }
                let Ok(raw) = i32::try_from(pid) else {
                    continue;
                };
                match kill(Pid::from_raw(raw), Signal::SIGTERM) {
                    Ok(()) => info!("Stopped leftover {} process (pid {})", name, pid),
                    Err(nix::errno::Errno::ESRCH) => {}
                    Err(e) => warn!("Failed to stop leftover {} (pid {}): {}", name, pid, e),
                }
            }
        }
    }

    async fn grant_x11_access(&self) {
        match run_helper("xhost", &["+local:"]).await {
            Some(output) if output.status.success() => debug!("Granted local X server access"),
            Some(output) => warn!("xhost +local: failed ({})", output.status),
            None => {}
        }
    }
}

/// Runs a helper tool with a timeout. `None` when it is missing or hangs.
async fn run_helper(program: &str, args: &[&str]) -> Option<Output> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match timeout(HELPER_TIMEOUT, command.output()).await {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            debug!("{} unavailable: {}", program, e);
            None
        }
        Err(_) => {
            warn!("{} did not finish within {:?}", program, HELPER_TIMEOUT);
            None
        }
    }
}

fn parse_pids(stdout: &[u8]) -> Vec<u32> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

#[derive(Debug, Clone, Copy)]
enum StopRequest {
    Terminate,
    Kill,
}

/// Forwards stop requests to the task that owns the child, so a signal is
/// never sent to a pid that was already reaped.
struct WaiterSignaller {
    tx: mpsc::UnboundedSender<StopRequest>,
}

impl WaiterSignaller {
    fn send(&self, request: StopRequest) -> io::Result<()> {
        self.tx
            .send(request)
            .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "engine has already exited"))
    }
}

impl EngineSignaller for WaiterSignaller {
    fn terminate(&self) -> io::Result<()> {
        self.send(StopRequest::Terminate)
    }

    fn kill(&self) -> io::Result<()> {
        self.send(StopRequest::Kill)
    }
}

fn deliver(child: &mut Child, request: StopRequest) {
    let result = match request {
        StopRequest::Terminate => match child.id().and_then(|id| i32::try_from(id).ok()) {
            Some(pid) => kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from),
            None => Ok(()),
        },
        StopRequest::Kill => child.start_kill(),
    };
    if let Err(e) = result {
        warn!("Failed to deliver {:?} to engine: {}", request, e);
    }
}

#[async_trait]
impl EngineLauncher for ProcessLauncher {
    async fn prepare(&self, facts: &PlatformFacts) {
        self.stop_stale().await;
        if self.x11_local_access && facts.display_server == DisplayServer::X11 {
            self.grant_x11_access().await;
        }
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<EngineHandle, DaemonError> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DaemonError::EngineLaunch(format!("{}: {}", spec.program, e)))?;

        let pid = child.id();
        let (exit_tx, exit_rx) = oneshot::channel();
        let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut requests_open = true;
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    request = stop_rx.recv(), if requests_open => match request {
                        Some(request) => deliver(&mut child, request),
                        // Nobody can stop the engine any more
                        None => {
                            requests_open = false;
                            deliver(&mut child, StopRequest::Kill);
                        }
                    },
                }
            };

            let exit = match status {
                Ok(status) => status.code().map_or_else(
                    || status.signal().map_or(EngineExit::Unknown, EngineExit::Signal),
                    EngineExit::Code,
                ),
                Err(e) => {
                    warn!("Failed to wait for engine process: {}", e);
                    EngineExit::Unknown
                }
            };
            drop(stop_rx);
            let _ = exit_tx.send(exit);
        });

        Ok(EngineHandle::new(pid, exit_rx, WaiterSignaller { tx: stop_tx }))
    }
}
