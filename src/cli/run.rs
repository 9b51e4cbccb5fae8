//! Runs the session daemon in the foreground.

use crate::cli::common::{rule_store, CliError, CliResult, DaemonLocation};
use crate::daemon::{forward_signals, SessionDaemon};
use crate::engine::{EngineLauncher, ProcessLauncher, ScriptedBehavior, ScriptedLauncher};
use crate::error::DaemonError;
use crate::platform::PlatformDetector;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Start the daemon and supervise the engine until stopped
#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Rules file (default: ~/.config/macmap/rules.toml, then /etc/macmap/rules.toml)
    #[arg(short, long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    #[command(flatten)]
    pub location: DaemonLocation,

    /// Engine executable to launch
    #[arg(long, value_name = "PROGRAM")]
    pub engine: Option<String>,

    /// Do not reload when the rules file changes
    #[arg(long)]
    pub no_watch: bool,

    /// Compile and supervise a stand-in engine instead of the real one
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    /// Execute the run command
    pub fn execute(&self) -> CliResult<()> {
        let mut config = self.location.load_config()?;
        if let Some(program) = &self.engine {
            config.engine.program.clone_from(program);
        }
        if self.no_watch {
            config.daemon.watch_rules = false;
        }
        config
            .validate()
            .map_err(|e| CliError::validation(format!("Invalid configuration: {e:#}")))?;

        let store = rule_store(&config, self.rules.as_deref())?;
        let launcher: Arc<dyn EngineLauncher> = if self.dry_run {
            info!("Dry run: {} will not be started", config.engine.program);
            Arc::new(ScriptedLauncher::new(ScriptedBehavior::RunUntilStopped))
        } else {
            Arc::new(ProcessLauncher::new(&config.engine))
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::io(format!("Failed to start async runtime: {e}")))?;

        let result = runtime.block_on(async {
            let (daemon, handle) = SessionDaemon::new(
                &config,
                PlatformDetector::system(),
                Arc::new(store),
                launcher,
            )?;

            let signals = tokio::spawn(async move {
                if let Err(e) = forward_signals(handle).await {
                    warn!("Signal handling unavailable: {}", e);
                }
            });
            let result = daemon.run().await;
            signals.abort();
            result
        });

        result.map_err(|e| match e {
            DaemonError::AlreadyRunning(_) | DaemonError::RuntimeDir(_) => {
                CliError::io(e.to_string())
            }
            DaemonError::InvalidRule(_) => CliError::validation(e.to_string()),
            DaemonError::Vocabulary(_) => CliError::io(e.to_string()),
            _ => CliError::daemon_failed(e.to_string()),
        })
    }
}
