//! CLI command handlers for macmap.
//!
//! Each subcommand is a clap `Args` struct with an `execute` method returning
//! [`CliResult`]; `main` maps errors to exit codes.

pub mod common;
pub mod compile;
pub mod detect;
pub mod reload;
pub mod run;
pub mod status;
pub mod stop;
pub mod validate;

// Re-export types used by main.rs and tests
pub use common::{CliError, CliResult, ExitCode};
pub use compile::CompileArgs;
pub use detect::DetectArgs;
pub use reload::ReloadArgs;
pub use run::RunArgs;
pub use status::StatusArgs;
pub use stop::StopArgs;
pub use validate::ValidateArgs;
