//! Scripted stand-in engine.
//!
//! Part of the public API as a testing aid, and what `macmap run --dry-run`
//! supervises instead of a real keymapper.

use super::{EngineExit, EngineHandle, EngineLauncher, EngineSignaller, LaunchSpec};
use crate::error::DaemonError;
use crate::platform::PlatformFacts;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const SIGTERM: i32 = 15;
const SIGKILL: i32 = 9;

/// What one scripted launch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedBehavior {
    /// Exits on its own after `delay` (or earlier on a signal)
    ExitAfter {
        /// Time until exit
        delay: Duration,
        /// Exit code
        code: i32,
    },
    /// Runs until terminated or killed
    RunUntilStopped,
    /// Ignores SIGTERM; only SIGKILL stops it
    IgnoreTerm,
    /// Spawning fails
    FailToSpawn,
}

#[derive(Debug, Clone, Copy)]
enum ScriptSignal {
    Term,
    Kill,
}

struct ChannelSignaller {
    tx: mpsc::UnboundedSender<ScriptSignal>,
}

impl EngineSignaller for ChannelSignaller {
    fn terminate(&self) -> io::Result<()> {
        let _ = self.tx.send(ScriptSignal::Term);
        Ok(())
    }

    fn kill(&self) -> io::Result<()> {
        let _ = self.tx.send(ScriptSignal::Kill);
        Ok(())
    }
}

#[derive(Debug)]
struct ScriptState {
    queue: VecDeque<ScriptedBehavior>,
    fallback: ScriptedBehavior,
    specs: Vec<LaunchSpec>,
}

/// Launcher that plays back a queue of behaviours, then repeats a fallback.
///
/// Clones share the same queue and counters.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    state: Arc<Mutex<ScriptState>>,
    launches: Arc<AtomicU32>,
    preparations: Arc<AtomicU32>,
}

impl ScriptedLauncher {
    /// Every launch behaves like `fallback` once the queue is empty.
    #[must_use]
    pub fn new(fallback: ScriptedBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                queue: VecDeque::new(),
                fallback,
                specs: Vec::new(),
            })),
            launches: Arc::new(AtomicU32::new(0)),
            preparations: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Queues a behaviour for the next unscripted launch.
    #[must_use]
    pub fn then(self, behavior: ScriptedBehavior) -> Self {
        self.lock().queue.push_back(behavior);
        self
    }

    /// Number of launch attempts, failed spawns included.
    #[must_use]
    pub fn launch_count(&self) -> u32 {
        self.launches.load(Ordering::SeqCst)
    }

    /// Number of times the pre-launch hook ran.
    #[must_use]
    pub fn prepare_count(&self) -> u32 {
        self.preparations.load(Ordering::SeqCst)
    }

    /// Launch spec of the most recent launch.
    #[must_use]
    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.lock().specs.last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn prepare(&self, _facts: &PlatformFacts) {
        self.preparations.fetch_add(1, Ordering::SeqCst);
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<EngineHandle, DaemonError> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = {
            let mut state = self.lock();
            state.specs.push(spec.clone());
            let fallback = state.fallback;
            state.queue.pop_front().unwrap_or(fallback)
        };

        if behavior == ScriptedBehavior::FailToSpawn {
            return Err(DaemonError::EngineLaunch(format!(
                "{}: scripted spawn failure",
                spec.program
            )));
        }

        let (exit_tx, exit_rx) = oneshot::channel();
        let (sig_tx, mut sig_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let exit = match behavior {
                ScriptedBehavior::ExitAfter { delay, code } => {
                    tokio::select! {
                        () = tokio::time::sleep(delay) => EngineExit::Code(code),
                        sig = sig_rx.recv() => signal_exit(sig),
                    }
                }
                ScriptedBehavior::RunUntilStopped => signal_exit(sig_rx.recv().await),
                ScriptedBehavior::IgnoreTerm => loop {
                    match sig_rx.recv().await {
                        Some(ScriptSignal::Term) => {}
                        Some(ScriptSignal::Kill) | None => break EngineExit::Signal(SIGKILL),
                    }
                },
                ScriptedBehavior::FailToSpawn => EngineExit::Unknown,
            };
            let _ = exit_tx.send(exit);
        });

        Ok(EngineHandle::new(
            Some(10_000 + n),
            exit_rx,
            ChannelSignaller { tx: sig_tx },
        ))
    }
}

fn signal_exit(signal: Option<ScriptSignal>) -> EngineExit {
    match signal {
        Some(ScriptSignal::Term) => EngineExit::Signal(SIGTERM),
        Some(ScriptSignal::Kill) | None => EngineExit::Signal(SIGKILL),
    }
}
