//! Unix signal mapping for a foreground daemon.

use crate::daemon::control::DaemonHandle;
use std::io;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Maps SIGTERM and SIGINT to stop, SIGHUP to reload. Runs until aborted.
pub async fn forward_signals(handle: DaemonHandle) -> io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            _ = terminate.recv() => {
                info!("Received SIGTERM, stopping");
                handle.stop();
            }
            _ = interrupt.recv() => {
                info!("Received SIGINT, stopping");
                handle.stop();
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP, reloading rules");
                handle.reload();
            }
        }
    }
}
