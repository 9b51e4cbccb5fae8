//! Configuration management for the daemon.
//!
//! This module handles loading and validating daemon settings in TOML
//! format with platform-specific directory resolution.

use crate::constants::{APP_DIR_NAME, CONFIG_FILE_NAME};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path configuration for file system locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathConfig {
    /// Rules file override (default: `<config dir>/rules.toml`, then `/etc/macmap/rules.toml`)
    pub rules_file: Option<PathBuf>,
    /// Runtime directory override for the artifact, pid and status files
    pub runtime_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Resolves the runtime directory.
    ///
    /// - Override, if set
    /// - `$XDG_RUNTIME_DIR/macmap/`
    /// - `/tmp/macmap-<uid>/` when there is no runtime dir
    #[must_use]
    pub fn resolved_runtime_dir(&self) -> PathBuf {
        if let Some(dir) = &self.runtime_dir {
            return dir.clone();
        }
        dirs::runtime_dir().map_or_else(
            || PathBuf::from(format!("/tmp/{}-{}", APP_DIR_NAME, nix::unistd::getuid())),
            |dir| dir.join(APP_DIR_NAME),
        )
    }
}

/// How the remapping engine is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable (looked up on `PATH` when not absolute)
    pub program: String,
    /// Arguments placed before the config flag
    pub args: Vec<String>,
    /// Flag that precedes the compiled artifact path
    pub config_flag: String,
    /// Leftover keymapper processes killed before the first launch
    pub stale_processes: Vec<String>,
    /// Grant local clients X server access (`xhost +local:`) on X11
    pub x11_local_access: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "xwaykeyz".to_string(),
            args: vec!["-w".to_string()],
            config_flag: "-c".to_string(),
            stale_processes: vec![
                "xwaykeyz".to_string(),
                "keyszer".to_string(),
                "xkeysnail".to_string(),
            ],
            x11_local_access: true,
        }
    }
}

/// Supervision timings and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Readiness checks before giving up on the display
    pub display_max_attempts: u32,
    /// First delay between readiness checks
    pub display_initial_backoff_ms: u64,
    /// Ceiling for the readiness backoff
    pub display_max_backoff_ms: u64,
    /// An engine exit within this window after spawn counts as a crash
    pub startup_grace_ms: u64,
    /// Crashes tolerated within `restart_window_secs`
    pub max_restarts: u32,
    /// Sliding window for counting crashes
    pub restart_window_secs: u64,
    /// First delay before restarting a crashed engine
    pub restart_backoff_ms: u64,
    /// Ceiling for the restart backoff
    pub restart_backoff_max_ms: u64,
    /// Wait after SIGTERM before SIGKILL
    pub stop_grace_ms: u64,
    /// Wait after SIGKILL before giving up on the child
    pub kill_wait_ms: u64,
    /// Reload when the rules file changes
    pub watch_rules: bool,
    /// Quiet period after a rules file event before reloading
    pub watch_debounce_ms: u64,
    /// Retry interval while no artifact has ever compiled
    pub rules_retry_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            display_max_attempts: 30,
            display_initial_backoff_ms: 250,
            display_max_backoff_ms: 4000,
            startup_grace_ms: 500,
            max_restarts: 5,
            restart_window_secs: 60,
            restart_backoff_ms: 500,
            restart_backoff_max_ms: 8000,
            stop_grace_ms: 5000,
            kill_wait_ms: 2000,
            watch_rules: true,
            watch_debounce_ms: 200,
            rules_retry_ms: 5000,
        }
    }
}

impl DaemonConfig {
    /// First display readiness backoff.
    #[must_use]
    pub const fn display_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.display_initial_backoff_ms)
    }

    /// Display readiness backoff ceiling.
    #[must_use]
    pub const fn display_max_backoff(&self) -> Duration {
        Duration::from_millis(self.display_max_backoff_ms)
    }

    /// Startup grace window.
    #[must_use]
    pub const fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    /// Crash counting window.
    #[must_use]
    pub const fn restart_window(&self) -> Duration {
        Duration::from_secs(self.restart_window_secs)
    }

    /// First restart backoff.
    #[must_use]
    pub const fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    /// Restart backoff ceiling.
    #[must_use]
    pub const fn restart_backoff_max(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_max_ms)
    }

    /// SIGTERM grace period.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// SIGKILL wait.
    #[must_use]
    pub const fn kill_wait(&self) -> Duration {
        Duration::from_millis(self.kill_wait_ms)
    }

    /// Rules file event debounce.
    #[must_use]
    pub const fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    /// Retry interval without a good artifact.
    #[must_use]
    pub const fn rules_retry(&self) -> Duration {
        Duration::from_millis(self.rules_retry_ms)
    }
}

/// Daemon configuration.
///
/// # File Location
///
/// - Linux: `~/.config/macmap/config.toml`
///
/// A missing file means defaults. Every section and key is optional.
///
/// # Validation
///
/// - `engine.program` and `engine.config_flag` must be non-empty
/// - `display_max_attempts` must be at least 1
/// - backoff, debounce and retry intervals must be non-zero
/// - backoff ceilings must not be below their initial values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// File system paths
    pub paths: PathConfig,
    /// Engine invocation
    pub engine: EngineConfig,
    /// Supervision settings
    pub daemon: DaemonConfig,
}

impl Config {
    /// Creates a new Config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the platform-specific config directory path.
    ///
    /// - Linux: `~/.config/macmap/`
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Gets the full path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from the default config file.
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Loads configuration from an explicit path; a missing file means defaults.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(config_path).context(format!(
            "Failed to read config file: {}",
            config_path.display()
        ))?;

        let config: Self = toml::from_str(&content).context(format!(
            "Failed to parse config file: {}",
            config_path.display()
        ))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.engine.program.trim().is_empty() {
            anyhow::bail!("engine.program cannot be empty");
        }
        if self.engine.config_flag.trim().is_empty() {
            anyhow::bail!("engine.config_flag cannot be empty");
        }

        let d = &self.daemon;
        if d.display_max_attempts == 0 {
            anyhow::bail!("daemon.display_max_attempts must be at least 1");
        }

        for (name, value) in [
            ("display_initial_backoff_ms", d.display_initial_backoff_ms),
            ("restart_backoff_ms", d.restart_backoff_ms),
            ("watch_debounce_ms", d.watch_debounce_ms),
            ("rules_retry_ms", d.rules_retry_ms),
            ("restart_window_secs", d.restart_window_secs),
        ] {
            if value == 0 {
                anyhow::bail!("daemon.{} must be greater than 0", name);
            }
        }

        if d.display_max_backoff_ms < d.display_initial_backoff_ms {
            anyhow::bail!(
                "daemon.display_max_backoff_ms ({}) is below display_initial_backoff_ms ({})",
                d.display_max_backoff_ms,
                d.display_initial_backoff_ms
            );
        }
        if d.restart_backoff_max_ms < d.restart_backoff_ms {
            anyhow::bail!(
                "daemon.restart_backoff_max_ms ({}) is below restart_backoff_ms ({})",
                d.restart_backoff_max_ms,
                d.restart_backoff_ms
            );
        }

        Ok(())
    }
}
