//! Mac-style keybinding remapping for Linux desktop sessions.
//!
//! This library detects the running display server and desktop, compiles a
//! layered rule set into the configuration script of a keymapper engine, and
//! supervises that engine for the lifetime of a graphical session.

// Module declarations
pub mod cli;
pub mod compiler;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod keys;
pub mod models;
pub mod platform;
pub mod store;

pub use compiler::{compile, CompiledArtifact, ConfigurationCompiler};
pub use daemon::{DaemonHandle, DaemonState, SessionDaemon, StatusSnapshot};
pub use error::{DaemonError, FailureReason};
pub use models::RuleSet;
pub use platform::{PlatformDetector, PlatformFacts};
