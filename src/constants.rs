//! Application-wide constants.
//!
//! This module defines names shared by the daemon, the CLI and the engine
//! contract: directory and file names, and the environment variables the
//! engine receives.

/// Directory name under the platform config and runtime dirs.
pub const APP_DIR_NAME: &str = "macmap";

/// Daemon settings file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Rules file name in the user config dir.
pub const RULES_FILE_NAME: &str = "rules.toml";

/// System-wide rules file, used when the user has none.
pub const SYSTEM_RULES_PATH: &str = "/etc/macmap/rules.toml";

/// Compiled engine configuration, in the runtime dir.
pub const ARTIFACT_FILE_NAME: &str = "config.py";

/// Daemon pid file, in the runtime dir.
pub const PID_FILE_NAME: &str = "macmap.pid";

/// Status snapshot for external tooling, in the runtime dir.
pub const STATUS_FILE_NAME: &str = "status.json";

/// Engine environment: detected display server.
pub const ENV_SESSION_TYPE: &str = "MACMAP_SESSION_TYPE";

/// Engine environment: detected compositor (may be empty).
pub const ENV_COMPOSITOR: &str = "MACMAP_COMPOSITOR";

/// Engine environment: normalised desktop name.
pub const ENV_DESKTOP: &str = "MACMAP_DESKTOP";

/// Engine environment: architecture family.
pub const ENV_ARCH: &str = "MACMAP_ARCH";
