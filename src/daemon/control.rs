//! External control surface of a running session daemon.

use crate::daemon::state::StatusSnapshot;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// Cloneable handle for stopping, reloading and observing a daemon.
///
/// Requests never block. Repeated reload requests that arrive before the
/// daemon gets to them are coalesced into one.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    shutdown: Arc<watch::Sender<bool>>,
    reload: Arc<Notify>,
    status: watch::Receiver<StatusSnapshot>,
}

impl DaemonHandle {
    pub(crate) const fn new(
        shutdown: Arc<watch::Sender<bool>>,
        reload: Arc<Notify>,
        status: watch::Receiver<StatusSnapshot>,
    ) -> Self {
        Self {
            shutdown,
            reload,
            status,
        }
    }

    /// Requests shutdown. Takes priority over anything else pending.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Requests a rules reload.
    pub fn reload(&self) {
        self.reload.notify_one();
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Waits until `predicate` holds for the status, or the daemon is gone.
    ///
    /// Returns the snapshot that satisfied the predicate, or the final
    /// snapshot once the daemon has exited.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&StatusSnapshot) -> bool,
    ) -> StatusSnapshot {
        let mut rx = self.status.clone();
        if let Ok(snapshot) = rx.wait_for(predicate).await {
            return snapshot.clone();
        }
        let last = rx.borrow().clone();
        last
    }
}

/// Resolves once a stop has been requested.
pub(crate) async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    let requested = rx.wait_for(|stop| *stop).await.is_ok();
    if !requested {
        std::future::pending::<()>().await;
    }
}
