//! The session daemon control loop.
//!
//! One task owns every piece of mutable state. Stop requests, reload
//! requests, engine exits, timers and rules-file events are all observed
//! through a single biased `select!`, so a stop always wins over whatever
//! else is pending at the same time.

use crate::compiler::{CompiledArtifact, ConfigurationCompiler};
use crate::config::{Config, DaemonConfig, EngineConfig};
use crate::constants::ARTIFACT_FILE_NAME;
use crate::daemon::backoff::Backoff;
use crate::daemon::control::{stop_requested, DaemonHandle};
use crate::daemon::files::{self, PidFile};
use crate::daemon::restart::{RestartDecision, RestartPolicy};
use crate::daemon::state::{DaemonState, EngineProcessState, EngineState, StatusSnapshot};
use crate::daemon::watch::RulesWatch;
use crate::engine::{EngineExit, EngineHandle, EngineLauncher, LaunchSpec};
use crate::error::{DaemonError, FailureReason};
use crate::platform::{PlatformDetector, PlatformFacts};
use crate::store::RuleSetSource;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

/// Supervises the remapping engine for one graphical session.
pub struct SessionDaemon {
    daemon: DaemonConfig,
    engine_config: EngineConfig,
    runtime_dir: PathBuf,
    artifact_path: PathBuf,
    detector: PlatformDetector,
    source: Arc<dyn RuleSetSource>,
    launcher: Arc<dyn EngineLauncher>,
    compiler: ConfigurationCompiler<'static>,

    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown: watch::Receiver<bool>,
    reload: Arc<Notify>,
    status: watch::Sender<StatusSnapshot>,

    state: DaemonState,
    engine: EngineProcessState,
    launches: u32,
    facts: Option<PlatformFacts>,
    artifact: Option<CompiledArtifact>,
    last_error: Option<String>,
    restarts: RestartPolicy,
}

impl SessionDaemon {
    /// Builds a daemon and the handle that controls it.
    pub fn new(
        config: &Config,
        detector: PlatformDetector,
        source: Arc<dyn RuleSetSource>,
        launcher: Arc<dyn EngineLauncher>,
    ) -> Result<(Self, DaemonHandle), DaemonError> {
        let compiler =
            ConfigurationCompiler::shared().map_err(|e| DaemonError::Vocabulary(e.to_string()))?;

        let runtime_dir = config.paths.resolved_runtime_dir();
        let artifact_path = runtime_dir.join(ARTIFACT_FILE_NAME);

        let (shutdown_tx, shutdown) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let reload = Arc::new(Notify::new());
        let (status, status_rx) = watch::channel(StatusSnapshot::idle(
            artifact_path.clone(),
            source.describe(),
        ));

        let handle = DaemonHandle::new(Arc::clone(&shutdown_tx), Arc::clone(&reload), status_rx);

        let daemon = Self {
            restarts: RestartPolicy::from_config(&config.daemon),
            daemon: config.daemon.clone(),
            engine_config: config.engine.clone(),
            runtime_dir,
            artifact_path,
            detector,
            source,
            launcher,
            compiler,
            shutdown_tx,
            shutdown,
            reload,
            status,
            state: DaemonState::Idle,
            engine: EngineProcessState::default(),
            launches: 0,
            facts: None,
            artifact: None,
            last_error: None,
        };

        Ok((daemon, handle))
    }

    /// Another handle to this daemon.
    #[must_use]
    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle::new(
            Arc::clone(&self.shutdown_tx),
            Arc::clone(&self.reload),
            self.status.subscribe(),
        )
    }

    /// Where the compiled configuration is written.
    #[must_use]
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Runs until stopped or failed.
    ///
    /// Returns `Ok(())` once the daemon reaches `Stopped`, or the fatal error
    /// behind a `Failed` state.
    pub async fn run(mut self) -> Result<(), DaemonError> {
        let _pid_file = PidFile::acquire(&self.runtime_dir)?;
        info!(
            "Session daemon starting (rules: {}, runtime dir: {})",
            self.source.describe(),
            self.runtime_dir.display()
        );

        self.set_state(DaemonState::WaitingForDisplay);
        let facts = match self.detector.detect() {
            Ok(facts) => facts,
            Err(e) => return Err(self.fail(e.into())),
        };
        info!(
            "Detected {} session ({}, {}) on {}",
            facts.display_server.as_str(),
            facts.desktop_environment,
            facts.compositor,
            facts.architecture
        );
        if facts.compatibility_mode {
            warn!("Running in compatibility mode on {}", facts.architecture);
        }
        self.facts = Some(facts.clone());
        self.publish();

        match self.wait_for_display(&facts).await {
            Ok(true) => {}
            Ok(false) => {
                self.finish();
                return Ok(());
            }
            Err(e) => return Err(self.fail(e)),
        }

        let mut watch = if self.daemon.watch_rules {
            RulesWatch::start(self.source.as_ref(), self.daemon.watch_debounce())
        } else {
            RulesWatch::disabled()
        };

        if !self.compile_initial(&facts, &mut watch).await {
            self.finish();
            return Ok(());
        }

        self.launcher.prepare(&facts).await;
        self.supervise(&facts, &mut watch).await
    }

    /// Polls display readiness with backoff. `Ok(false)` means stop requested.
    async fn wait_for_display(&self, facts: &PlatformFacts) -> Result<bool, DaemonError> {
        let mut shutdown = self.shutdown.clone();
        let mut backoff = Backoff::new(
            self.daemon.display_initial_backoff(),
            self.daemon.display_max_backoff(),
        );
        let attempts = self.daemon.display_max_attempts;

        for attempt in 1..=attempts {
            if self.detector.display_ready(facts) {
                debug!("Display ready after {} attempt(s)", attempt);
                return Ok(true);
            }
            if attempt == attempts {
                break;
            }

            let delay = backoff.next_delay();
            debug!(
                "Display not ready (attempt {}/{}), retrying in {:?}",
                attempt, attempts, delay
            );
            tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => return Ok(false),
                () = sleep(delay) => {}
            }
        }

        Err(DaemonError::DisplayUnavailable { attempts })
    }

    /// Compiles until an artifact exists. `false` means stop requested.
    async fn compile_initial(&mut self, facts: &PlatformFacts, watch: &mut RulesWatch) -> bool {
        let mut shutdown = self.shutdown.clone();
        let reload = Arc::clone(&self.reload);

        loop {
            self.set_state(DaemonState::Compiling);
            if self.recompile(facts).is_ok() {
                return true;
            }

            let retry_at = Instant::now() + self.daemon.rules_retry();
            warn!(
                "No usable configuration yet, retrying in {:?} or on reload",
                self.daemon.rules_retry()
            );
            tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => return false,
                () = reload.notified() => {}
                () = sleep_until(retry_at) => {}
                () = watch.changed() => info!("Rules changed, recompiling"),
            }
        }
    }

    /// Launch, watch and relaunch the engine until stop or a fatal error.
    async fn supervise(
        &mut self,
        facts: &PlatformFacts,
        watch: &mut RulesWatch,
    ) -> Result<(), DaemonError> {
        let mut shutdown = self.shutdown.clone();
        let reload = Arc::clone(&self.reload);

        'launch: loop {
            if self.stop_pending() {
                self.finish();
                return Ok(());
            }
            self.set_state(DaemonState::Launching);
            self.launches += 1;
            self.engine.restart_count = self.launches - 1;

            let spec = LaunchSpec::new(&self.engine_config, &self.artifact_path, facts);
            let mut handle = match self.launcher.launch(&spec) {
                Ok(handle) => handle,
                Err(e) => {
                    error!("{}", e);
                    self.last_error = Some(e.to_string());
                    self.engine.state = EngineState::Failed;
                    self.engine.pid = None;
                    let delay = self.on_engine_failure(Some(e))?;
                    if !self.wait_restart(delay, facts, watch).await {
                        self.finish();
                        return Ok(());
                    }
                    continue 'launch;
                }
            };

            self.engine.state = EngineState::Starting;
            self.engine.pid = handle.pid;
            self.engine.started_at = Some(Utc::now());
            info!("Engine started (pid {})", describe_pid(handle.pid));
            self.publish();

            let early_exit = tokio::select! {
                biased;
                () = stop_requested(&mut shutdown) => {
                    self.stop_engine(handle).await;
                    self.finish();
                    return Ok(());
                }
                exit = &mut handle.exit => Some(exit.unwrap_or(EngineExit::Unknown)),
                () = sleep(self.daemon.startup_grace()) => None,
            };

            if let Some(exit) = early_exit {
                warn!("Engine exited during startup ({})", exit);
                self.record_exit(exit, EngineState::Failed);
                self.last_error = Some(format!("engine exited during startup: {exit}"));
                let delay = self.on_engine_failure(None)?;
                if !self.wait_restart(delay, facts, watch).await {
                    self.finish();
                    return Ok(());
                }
                continue 'launch;
            }

            self.engine.state = EngineState::Running;
            self.set_state(DaemonState::Running);

            loop {
                tokio::select! {
                    biased;
                    () = stop_requested(&mut shutdown) => {
                        self.stop_engine(handle).await;
                        self.finish();
                        return Ok(());
                    }
                    exit = &mut handle.exit => {
                        let exit = exit.unwrap_or(EngineExit::Unknown);
                        if exit.is_success() {
                            info!("Engine exited cleanly, shutting down");
                            self.record_exit(exit, EngineState::Stopped);
                            self.finish();
                            return Ok(());
                        }

                        warn!("Engine exited unexpectedly ({})", exit);
                        self.record_exit(exit, EngineState::Failed);
                        self.last_error = Some(format!("engine exited unexpectedly: {exit}"));
                        let delay = self.on_engine_failure(None)?;
                        if !self.wait_restart(delay, facts, watch).await {
                            self.finish();
                            return Ok(());
                        }
                        continue 'launch;
                    }
                    () = reload.notified() => info!("Reload requested"),
                    () = watch.changed() => info!("Rules changed, reloading"),
                }

                if self.reload_running(facts) {
                    self.set_state(DaemonState::Restarting);
                    self.terminate_engine(handle).await;
                    // A stop that arrived while the old engine wound down wins
                    if self.stop_pending() {
                        self.finish();
                        return Ok(());
                    }
                    continue 'launch;
                }
            }
        }
    }

    /// Records a crash or spawn failure and returns the backoff before the
    /// next launch, or the fatal error once the restart budget is spent.
    fn on_engine_failure(&mut self, spawn_error: Option<DaemonError>) -> Result<Duration, DaemonError> {
        match self.restarts.record_failure(Instant::now()) {
            RestartDecision::Restart { delay, failures } => {
                info!(
                    "Restarting engine in {:?} (failure {} in window)",
                    delay, failures
                );
                self.set_state(DaemonState::Restarting);
                Ok(delay)
            }
            RestartDecision::GiveUp { failures } => {
                let err = spawn_error.unwrap_or(DaemonError::CrashLoopDetected {
                    failures,
                    window_secs: self.restarts.window().as_secs(),
                });
                error!("Giving up on engine: {}", err);
                Err(self.fail(err))
            }
        }
    }

    /// Waits out a restart backoff. `false` means stop requested.
    ///
    /// A reload during the wait recompiles and relaunches right away.
    async fn wait_restart(
        &mut self,
        delay: Duration,
        facts: &PlatformFacts,
        watch: &mut RulesWatch,
    ) -> bool {
        let mut shutdown = self.shutdown.clone();
        let reload = Arc::clone(&self.reload);

        let recompile = tokio::select! {
            biased;
            () = stop_requested(&mut shutdown) => return false,
            () = reload.notified() => {
                info!("Reload requested while restarting");
                true
            }
            () = watch.changed() => {
                info!("Rules changed while restarting");
                true
            }
            () = sleep(delay) => false,
        };

        if recompile {
            self.set_state(DaemonState::Compiling);
            // Failure keeps the previous artifact
            let _ = self.recompile(facts);
        }
        true
    }

    /// Recompiles while the engine runs. Returns true when the engine must be
    /// restarted to pick up a new artifact.
    fn reload_running(&mut self, facts: &PlatformFacts) -> bool {
        self.set_state(DaemonState::Compiling);
        let restart = match self.recompile(facts) {
            Ok(true) => true,
            Ok(false) => {
                info!("Configuration unchanged, engine keeps running");
                false
            }
            Err(_) => {
                warn!("Keeping previous configuration");
                false
            }
        };
        if !restart {
            self.set_state(DaemonState::Running);
        }
        restart
    }

    /// Loads and compiles the current rules, recording the outcome.
    ///
    /// `Ok(true)` when a new artifact was written.
    fn recompile(&mut self, facts: &PlatformFacts) -> Result<bool, DaemonError> {
        let result = self.compile_artifact(facts);
        match &result {
            Ok(_) => self.last_error = None,
            Err(e) => {
                warn!("{}", e);
                self.last_error = Some(e.to_string());
            }
        }
        self.publish();
        result
    }

    fn compile_artifact(&mut self, facts: &PlatformFacts) -> Result<bool, DaemonError> {
        let rules = self
            .source
            .load()
            .map_err(|e| DaemonError::RuleSource(format!("{e:#}")))?;
        let artifact = self
            .compiler
            .compile(&rules, facts)
            .map_err(|e| DaemonError::InvalidRule(e.to_string()))?;

        if self
            .artifact
            .as_ref()
            .is_some_and(|current| current.digest == artifact.digest)
        {
            debug!("Compiled configuration unchanged ({})", short_digest(&artifact.digest));
            return Ok(false);
        }

        files::write_atomic(&self.artifact_path, artifact.text.as_bytes()).map_err(|e| {
            DaemonError::Artifact(format!("{}: {e}", self.artifact_path.display()))
        })?;
        info!(
            "Wrote {} ({} rules, digest {})",
            self.artifact_path.display(),
            rules.rule_count(),
            short_digest(&artifact.digest)
        );
        self.artifact = Some(artifact);
        Ok(true)
    }

    fn stop_pending(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stops the engine as part of daemon shutdown.
    async fn stop_engine(&mut self, handle: EngineHandle) {
        self.set_state(DaemonState::ShuttingDown);
        self.terminate_engine(handle).await;
    }

    /// SIGTERM, wait up to `stop_grace`, then SIGKILL and wait up to `kill_wait`.
    async fn terminate_engine(&mut self, mut handle: EngineHandle) {
        self.engine.state = EngineState::Stopping;
        self.publish();

        if let Err(e) = handle.terminate() {
            debug!("Failed to send SIGTERM to engine: {}", e);
        }

        let exit = match timeout(self.daemon.stop_grace(), &mut handle.exit).await {
            Ok(exit) => Some(exit.unwrap_or(EngineExit::Unknown)),
            Err(_) => {
                warn!(
                    "Engine still running {:?} after SIGTERM, sending SIGKILL",
                    self.daemon.stop_grace()
                );
                if let Err(e) = handle.kill() {
                    warn!("Failed to send SIGKILL to engine: {}", e);
                }
                match timeout(self.daemon.kill_wait(), &mut handle.exit).await {
                    Ok(exit) => Some(exit.unwrap_or(EngineExit::Unknown)),
                    Err(_) => {
                        error!(
                            "Engine (pid {}) did not exit after SIGKILL",
                            describe_pid(handle.pid)
                        );
                        None
                    }
                }
            }
        };

        match exit {
            Some(exit) => {
                debug!("Engine stopped ({})", exit);
                self.record_exit(exit, EngineState::Stopped);
            }
            None => {
                self.engine.state = EngineState::Stopped;
                self.engine.pid = None;
                self.publish();
            }
        }
    }

    fn record_exit(&mut self, exit: EngineExit, state: EngineState) {
        self.engine.last_exit_code = exit.code();
        self.engine.pid = None;
        self.engine.state = state;
        self.publish();
    }

    fn finish(&mut self) {
        if self.state != DaemonState::ShuttingDown {
            self.set_state(DaemonState::ShuttingDown);
        }
        self.set_state(DaemonState::Stopped);
        info!("Session daemon stopped");
    }

    /// Enters `Failed` and hands the error back for the caller to return.
    fn fail(&mut self, err: DaemonError) -> DaemonError {
        let reason = err
            .failure_reason()
            .unwrap_or(FailureReason::EngineLaunchError);
        error!("Session daemon failed: {}", err);
        self.last_error = Some(err.to_string());
        self.set_state(DaemonState::Failed(reason));
        err
    }

    fn set_state(&mut self, state: DaemonState) {
        if self.state != state {
            info!("State: {} -> {}", self.state, state);
            self.state = state;
        }
        self.publish();
    }

    /// Publishes a snapshot to handles and the status file.
    fn publish(&self) {
        let snapshot = StatusSnapshot {
            state: self.state,
            engine: self.engine.clone(),
            artifact_digest: self.artifact.as_ref().map(|a| a.digest.clone()),
            artifact_path: self.artifact_path.clone(),
            facts: self.facts.clone(),
            last_error: self.last_error.clone(),
            rules_source: self.source.describe(),
            daemon_pid: std::process::id(),
            updated_at: Utc::now(),
        };

        if let Err(e) = files::write_status(&self.runtime_dir, &snapshot) {
            debug!("{:#}", e);
        }
        self.status.send_replace(snapshot);
    }
}

fn describe_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
