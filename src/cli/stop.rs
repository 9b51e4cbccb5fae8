//! Stops a running daemon.

use crate::cli::common::{CliError, CliResult, DaemonLocation};
use crate::daemon::files;
use clap::Args;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::{Duration, Instant};

/// Ask the running daemon to stop the engine and exit
#[derive(Debug, Clone, Args)]
pub struct StopArgs {
    #[command(flatten)]
    pub location: DaemonLocation,

    /// Wait until the daemon has exited
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds to wait with --wait
    #[arg(long, value_name = "SECS", default_value = "10")]
    pub timeout: u64,
}

impl StopArgs {
    /// Execute the stop command
    pub fn execute(&self) -> CliResult<()> {
        let (pid, _) = self.location.running_pid()?;
        send_signal(pid, Signal::SIGTERM)?;

        if !self.wait {
            println!("Sent stop request to daemon (pid {pid})");
            return Ok(());
        }

        let deadline = Instant::now() + Duration::from_secs(self.timeout);
        while files::process_alive(pid) {
            if Instant::now() >= deadline {
                return Err(CliError::io(format!(
                    "Daemon (pid {pid}) still running after {}s",
                    self.timeout
                )));
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        println!("Daemon stopped");
        Ok(())
    }
}

/// Sends `signal` to the daemon process.
pub(crate) fn send_signal(pid: i32, signal: Signal) -> CliResult<()> {
    kill(Pid::from_raw(pid), signal)
        .map_err(|e| CliError::io(format!("Failed to signal daemon (pid {pid}): {e}")))
}
