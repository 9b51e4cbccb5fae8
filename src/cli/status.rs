//! Shows the daemon's last published status.

use crate::cli::common::{print_json, CliError, CliResult, DaemonLocation};
use crate::daemon::{files, StatusSnapshot};
use clap::Args;
use serde::Serialize;

/// Show daemon and engine status
#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub location: DaemonLocation,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    running: bool,
    #[serde(flatten)]
    status: &'a StatusSnapshot,
}

impl StatusArgs {
    /// Execute the status command
    pub fn execute(&self) -> CliResult<()> {
        let runtime_dir = self.location.load_config()?.paths.resolved_runtime_dir();
        let status = files::read_status(&runtime_dir).map_err(|e| {
            CliError::not_running(format!("No daemon status available: {e:#}"))
        })?;
        let running = files::running_daemon(&runtime_dir)
            .is_some_and(|pid| u32::try_from(pid).ok() == Some(status.daemon_pid));

        if self.json {
            print_json(&StatusOutput {
                running,
                status: &status,
            })?;
        } else {
            print_human(&status, running);
        }

        if running {
            Ok(())
        } else {
            Err(CliError::not_running(format!(
                "Daemon is not running (last state: {})",
                status.state
            )))
        }
    }
}

fn print_human(status: &StatusSnapshot, running: bool) {
    println!("State:      {}", status.state);
    println!(
        "Daemon:     {} (pid {})",
        if running { "running" } else { "not running" },
        status.daemon_pid
    );

    let engine = &status.engine;
    let pid = engine
        .pid
        .map_or_else(|| "-".to_string(), |pid| pid.to_string());
    println!(
        "Engine:     {} (pid {}, {} restarts)",
        engine.state, pid, engine.restart_count
    );
    if let Some(started) = engine.started_at {
        println!("Started:    {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(code) = engine.last_exit_code {
        println!("Last exit:  {code}");
    }

    if let Some(facts) = &status.facts {
        println!(
            "Session:    {} / {} / {} ({})",
            facts.display_server.as_str(),
            facts.desktop_environment,
            facts.compositor,
            facts.architecture
        );
    }

    match &status.artifact_digest {
        Some(digest) => println!(
            "Artifact:   {} ({})",
            status.artifact_path.display(),
            digest.get(..12).unwrap_or(digest)
        ),
        None => println!("Artifact:   not compiled"),
    }
    println!("Rules:      {}", status.rules_source);

    if let Some(error) = &status.last_error {
        println!("Last error: {error}");
    }
}
