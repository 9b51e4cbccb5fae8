//! Session daemon: waits for the display, compiles the rules, and keeps the
//! remapping engine running for the lifetime of the graphical session.

pub mod backoff;
pub mod control;
pub mod files;
pub mod restart;
mod session;
mod signals;
pub mod state;
mod watch;

pub use control::DaemonHandle;
pub use restart::{RestartDecision, RestartPolicy};
pub use session::SessionDaemon;
pub use signals::forward_signals;
pub use state::{DaemonState, EngineProcessState, EngineState, StatusSnapshot};
