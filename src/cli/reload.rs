//! Asks a running daemon to reload its rules.

use crate::cli::common::{CliResult, DaemonLocation};
use crate::cli::stop::send_signal;
use clap::Args;
use nix::sys::signal::Signal;

/// Recompile the rules and restart the engine if they changed
#[derive(Debug, Clone, Args)]
pub struct ReloadArgs {
    #[command(flatten)]
    pub location: DaemonLocation,
}

impl ReloadArgs {
    /// Execute the reload command
    pub fn execute(&self) -> CliResult<()> {
        let (pid, _) = self.location.running_pid()?;
        send_signal(pid, Signal::SIGHUP)?;
        println!("Sent reload request to daemon (pid {pid})");
        Ok(())
    }
}
