//! macmap - Mac-style keybindings for Linux desktops
//!
//! Compiles layered rules into a keymapper configuration and keeps the
//! keymapper running for the current graphical session.

use clap::{Parser, Subcommand};
use macmap::cli::{
    CompileArgs, DetectArgs, ExitCode, ReloadArgs, RunArgs, StatusArgs, StopArgs, ValidateArgs,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// macmap - Mac-style keybindings for Linux desktops
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the session daemon in the foreground
    Run(RunArgs),
    /// Stop the running daemon
    Stop(StopArgs),
    /// Reload rules in the running daemon
    Reload(ReloadArgs),
    /// Show daemon status
    Status(StatusArgs),
    /// Compile rules to a keymapper configuration
    Compile(CompileArgs),
    /// Validate a rules file
    Validate(ValidateArgs),
    /// Show the detected platform
    Detect(DetectArgs),
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so command output on stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Command::Run(args) => args.execute(),
        Command::Stop(args) => args.execute(),
        Command::Reload(args) => args.execute(),
        Command::Status(args) => args.execute(),
        Command::Compile(args) => args.execute(),
        Command::Validate(args) => args.execute(),
        Command::Detect(args) => args.execute(),
    };

    match result {
        Ok(()) => std::process::exit(ExitCode::Success.code()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
