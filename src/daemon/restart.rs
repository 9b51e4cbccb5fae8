//! Sliding-window restart policy.

use super::backoff::delay_for_attempt;
use crate::config::DaemonConfig;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of recording an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Relaunch after `delay`
    Restart {
        /// Backoff before relaunching
        delay: Duration,
        /// Failures currently inside the window
        failures: u32,
    },
    /// Too many failures inside the window
    GiveUp {
        /// Failures currently inside the window
        failures: u32,
    },
}

/// Allows at most `max_restarts` failures within `window`.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    max_restarts: u32,
    window: Duration,
    backoff: Duration,
    backoff_max: Duration,
    failures: VecDeque<Instant>,
}

impl RestartPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(
        max_restarts: u32,
        window: Duration,
        backoff: Duration,
        backoff_max: Duration,
    ) -> Self {
        Self {
            max_restarts,
            window,
            backoff,
            backoff_max,
            failures: VecDeque::new(),
        }
    }

    /// Policy from daemon settings.
    #[must_use]
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(
            config.max_restarts,
            config.restart_window(),
            config.restart_backoff(),
            config.restart_backoff_max(),
        )
    }

    /// Records a failure at `now` and decides whether to restart.
    pub fn record_failure(&mut self, now: Instant) -> RestartDecision {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
        self.failures.push_back(now);

        let failures = self.failures.len() as u32;
        if failures > self.max_restarts {
            RestartDecision::GiveUp { failures }
        } else {
            RestartDecision::Restart {
                delay: delay_for_attempt(self.backoff, self.backoff_max, failures),
                failures,
            }
        }
    }

    /// Failures currently counted.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures.len()
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}
