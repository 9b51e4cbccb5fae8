//! Rules change notifications for the control loop.

use crate::store::{RuleSetSource, SourceWatch};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Debounced change events from a [`RuleSetSource`].
///
/// A disabled watch never fires.
#[derive(Debug)]
pub(crate) struct RulesWatch {
    rx: Option<mpsc::UnboundedReceiver<()>>,
    debounce: Duration,
    pending: bool,
    _guard: SourceWatch,
}

impl RulesWatch {
    pub(crate) fn disabled() -> Self {
        Self {
            rx: None,
            debounce: Duration::ZERO,
            pending: false,
            _guard: SourceWatch::default(),
        }
    }

    /// Subscribes to `source`. Falls back to a disabled watch when the source
    /// cannot be watched; reloads still work.
    pub(crate) fn start(source: &dyn RuleSetSource, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        match source.watch(tx) {
            Ok(guard) => {
                debug!("Watching {} for changes", source.describe());
                Self {
                    rx: Some(rx),
                    debounce,
                    pending: false,
                    _guard: guard,
                }
            }
            Err(e) => {
                warn!("Not watching {}: {:#}", source.describe(), e);
                Self::disabled()
            }
        }
    }

    /// Resolves once a change arrived and `debounce` passed without another.
    ///
    /// Cancel safe: an event seen before cancellation is kept for the next call.
    pub(crate) async fn changed(&mut self) {
        loop {
            let Some(rx) = self.rx.as_mut() else {
                return std::future::pending().await;
            };

            if self.pending {
                sleep(self.debounce).await;
                let mut more = false;
                while rx.try_recv().is_ok() {
                    more = true;
                }
                if !more {
                    self.pending = false;
                    return;
                }
                continue;
            }

            if rx.recv().await.is_some() {
                self.pending = true;
            } else {
                self.rx = None;
            }
        }
    }
}
