//! Compiles a rules file to the engine configuration.

use crate::cli::common::{detector, rule_store, CliError, CliResult, DaemonLocation, SessionArg};
use crate::compiler::{CompileError, ConfigurationCompiler};
use crate::daemon::files::write_atomic;
use crate::store::RuleSetSource;
use clap::Args;
use std::path::PathBuf;

/// Compile rules for the current (or a chosen) session
#[derive(Debug, Clone, Args)]
pub struct CompileArgs {
    /// Rules file (default: ~/.config/macmap/rules.toml, then /etc/macmap/rules.toml)
    #[arg(short, long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Write the configuration here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the SHA-256 digest of the configuration
    #[arg(long)]
    pub print_digest: bool,

    /// Compile for this display server instead of detecting it
    #[arg(long, value_enum)]
    pub session: Option<SessionArg>,

    #[command(flatten)]
    pub location: DaemonLocation,
}

impl CompileArgs {
    /// Execute the compile command
    pub fn execute(&self) -> CliResult<()> {
        let config = self.location.load_config()?;
        let store = rule_store(&config, self.rules.as_deref())?;
        let rules = store
            .load()
            .map_err(|e| CliError::validation(format!("{e:#}")))?;

        let facts = detector(self.session)
            .detect()
            .map_err(|e| CliError::validation(format!("{e} (use --session to choose one)")))?;

        let compiler = ConfigurationCompiler::shared().map_err(|e| CliError::io(e.to_string()))?;
        let artifact = compiler.compile(&rules, &facts).map_err(|e| match e {
            CompileError::InvalidRules(report) => {
                CliError::validation(report.format_message().trim_end().to_string())
            }
            other => CliError::io(other.to_string()),
        })?;

        match &self.output {
            Some(path) => {
                write_atomic(path, artifact.text.as_bytes()).map_err(|e| {
                    CliError::io(format!("Failed to write {}: {e}", path.display()))
                })?;
                eprintln!("Wrote {}", path.display());
            }
            None if !self.print_digest => print!("{}", artifact.text),
            None => {}
        }

        if self.print_digest {
            println!("{}", artifact.digest);
        }

        Ok(())
    }
}
