//! Platform detection: architecture, display server, desktop and compositor.
//!
//! Detection only reads state through an [`Environment`], so it is
//! idempotent and can be driven from a fixed table in tests.

mod names;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Capability: a system tray is available for status icons.
pub const CAP_SYSTEM_TRAY: &str = "system-tray";
/// Capability: the compositor implements `wlr-layer-shell`.
pub const CAP_LAYER_SHELL: &str = "wlr-layer-shell";
/// Capability: X11 clients run through Xwayland.
pub const CAP_XWAYLAND: &str = "xwayland";
/// Capability: the engine can read the focused window's class and title.
pub const CAP_WINDOW_CONTEXT: &str = "window-context";

/// CPU architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// 64-bit x86
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM
    #[serde(rename = "aarch64")]
    Aarch64,
    /// 32-bit ARM (runs in compatibility mode)
    #[serde(rename = "arm32")]
    Arm32,
    /// Anything else
    #[serde(rename = "other")]
    Other,
}

impl Architecture {
    /// Maps a `uname` machine string onto an architecture family.
    #[must_use]
    pub fn from_machine(machine: &str) -> Self {
        match machine.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Self::X86_64,
            "aarch64" | "arm64" | "armv8l" => Self::Aarch64,
            m if m.starts_with("arm") => Self::Arm32,
            _ => Self::Other,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Arm32 => "arm32",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display server kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayServer {
    /// X.Org / X11
    X11,
    /// Any Wayland compositor
    Wayland,
    /// Not determined
    Unknown,
}

impl DisplayServer {
    /// Stable lowercase name (also the `XDG_SESSION_TYPE` value).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X11 => "x11",
            Self::Wayland => "wayland",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DisplayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of the running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFacts {
    /// CPU architecture family
    pub architecture: Architecture,
    /// X11 or Wayland
    pub display_server: DisplayServer,
    /// Compositor / window manager, empty when unknown
    pub compositor: String,
    /// Normalised desktop name, "unknown" when unknown
    pub desktop_environment: String,
    /// Feature tags, sorted
    pub capabilities: BTreeSet<String>,
    /// Set on platforms the engine only partially supports
    pub compatibility_mode: bool,
}

impl PlatformFacts {
    /// Returns true if the capability tag is present.
    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }
}

/// No usable display server could be determined.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "no display server detected (WAYLAND_DISPLAY and DISPLAY unset, XDG_SESSION_TYPE={session_type:?})"
)]
pub struct DetectionError {
    /// Raw `XDG_SESSION_TYPE` value, empty if unset
    pub session_type: String,
}

/// Read-only view of process state used by detection.
pub trait Environment: Send + Sync {
    /// Non-empty environment variable value.
    fn var(&self, name: &str) -> Option<String>;

    /// Machine hardware name as reported by `uname -m`.
    fn machine(&self) -> String;

    /// Whether a filesystem path exists.
    fn path_exists(&self, path: &Path) -> bool;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    fn machine(&self) -> String {
        nix::sys::utsname::uname().map_or_else(
            |_| std::env::consts::ARCH.to_string(),
            |uts| uts.machine().to_string_lossy().into_owned(),
        )
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Fixed environment for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
    machine: String,
    paths: HashSet<PathBuf>,
}

impl StaticEnvironment {
    /// Creates an empty environment reporting the given machine type.
    pub fn new(machine: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            ..Self::default()
        }
    }

    /// Sets a variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Marks a path as existing.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(path.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    fn machine(&self) -> String {
        self.machine.clone()
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }
}

/// Wraps an environment so detection reports a chosen display server.
///
/// Used to compile for a session other than the current one, e.g. from a
/// text console. Variables that would point at the other server are hidden.
#[derive(Debug, Clone)]
pub struct ForcedSession<E> {
    inner: E,
    display_server: DisplayServer,
}

impl<E: Environment> ForcedSession<E> {
    /// Forces `display_server` on top of `inner`.
    pub const fn new(inner: E, display_server: DisplayServer) -> Self {
        Self {
            inner,
            display_server,
        }
    }
}

impl<E: Environment> Environment for ForcedSession<E> {
    fn var(&self, name: &str) -> Option<String> {
        match (name, self.display_server) {
            ("XDG_SESSION_TYPE", server) => Some(server.as_str().to_string()),
            ("WAYLAND_DISPLAY", DisplayServer::X11) => None,
            _ => self.inner.var(name),
        }
    }

    fn machine(&self) -> String {
        self.inner.machine()
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.inner.path_exists(path)
    }
}

/// Platform detection over an [`Environment`].
#[derive(Clone)]
pub struct PlatformDetector {
    env: Arc<dyn Environment>,
}

impl fmt::Debug for PlatformDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDetector").finish_non_exhaustive()
    }
}

impl PlatformDetector {
    /// Detector over the real process environment.
    #[must_use]
    pub fn system() -> Self {
        Self::new(SystemEnvironment)
    }

    /// Detector over a custom environment.
    pub fn new(env: impl Environment + 'static) -> Self {
        Self { env: Arc::new(env) }
    }

    /// Detects the current platform.
    ///
    /// Fails only when neither a Wayland nor an X11 session can be found.
    pub fn detect(&self) -> Result<PlatformFacts, DetectionError> {
        let env = self.env.as_ref();
        let display_server = detect_display_server(env)?;
        let architecture = Architecture::from_machine(&env.machine());
        let desktop_environment = detect_desktop(env);
        let compositor = detect_compositor(env, &desktop_environment);
        let capabilities =
            detect_capabilities(env, display_server, &desktop_environment, &compositor);

        Ok(PlatformFacts {
            architecture,
            display_server,
            compositor,
            desktop_environment,
            capabilities,
            compatibility_mode: architecture == Architecture::Arm32,
        })
    }

    /// Whether the detected display server accepts connections yet.
    ///
    /// Wayland is ready once its socket exists. A local X11 display is ready
    /// once `/tmp/.X11-unix/X<n>` exists; remote displays are assumed ready.
    #[must_use]
    pub fn display_ready(&self, facts: &PlatformFacts) -> bool {
        let env = self.env.as_ref();
        match facts.display_server {
            DisplayServer::Wayland => wayland_socket(env).is_some_and(|p| env.path_exists(&p)),
            DisplayServer::X11 => match env.var("DISPLAY") {
                Some(display) => match x11_socket(&display) {
                    Some(socket) => env.path_exists(&socket),
                    None => is_remote_display(&display),
                },
                None => false,
            },
            DisplayServer::Unknown => false,
        }
    }
}

/// Detects with the real process environment.
pub fn detect() -> Result<PlatformFacts, DetectionError> {
    PlatformDetector::system().detect()
}

fn detect_display_server(env: &dyn Environment) -> Result<DisplayServer, DetectionError> {
    let session_type = env.var("XDG_SESSION_TYPE").unwrap_or_default();
    let session_type_lc = session_type.to_ascii_lowercase();

    // A Wayland session may also export DISPLAY for Xwayland
    if env.var("WAYLAND_DISPLAY").is_some() || session_type_lc == "wayland" {
        return Ok(DisplayServer::Wayland);
    }
    if env.var("DISPLAY").is_some() || session_type_lc == "x11" {
        return Ok(DisplayServer::X11);
    }

    Err(DetectionError { session_type })
}

fn detect_desktop(env: &dyn Environment) -> String {
    let raw = env
        .var("XDG_CURRENT_DESKTOP")
        .and_then(|v| v.split(':').next().map(str::to_string))
        .or_else(|| env.var("XDG_SESSION_DESKTOP"))
        .or_else(|| env.var("DESKTOP_SESSION"));

    match raw {
        Some(raw) => names::normalize_desktop(&raw)
            .map_or_else(|| raw.trim().to_ascii_lowercase(), str::to_string),
        None => "unknown".to_string(),
    }
}

fn detect_compositor(env: &dyn Environment, desktop: &str) -> String {
    for (var, compositor) in names::COMPOSITOR_SOCKETS {
        if env.var(var).is_some() {
            return (*compositor).to_string();
        }
    }
    names::compositor_for_desktop(desktop)
        .unwrap_or_default()
        .to_string()
}

fn detect_capabilities(
    env: &dyn Environment,
    display_server: DisplayServer,
    desktop: &str,
    compositor: &str,
) -> BTreeSet<String> {
    let mut caps = BTreeSet::new();

    match display_server {
        DisplayServer::X11 => {
            caps.insert(CAP_SYSTEM_TRAY.to_string());
            caps.insert(CAP_WINDOW_CONTEXT.to_string());
        }
        DisplayServer::Wayland => {
            if !names::TRAYLESS_DESKTOPS.contains(&desktop) {
                caps.insert(CAP_SYSTEM_TRAY.to_string());
            }
            if names::LAYER_SHELL_COMPOSITORS.contains(&compositor) {
                caps.insert(CAP_LAYER_SHELL.to_string());
            }
            if names::WINDOW_CONTEXT_COMPOSITORS.contains(&compositor) {
                caps.insert(CAP_WINDOW_CONTEXT.to_string());
            }
            if env.var("DISPLAY").is_some() {
                caps.insert(CAP_XWAYLAND.to_string());
            }
        }
        DisplayServer::Unknown => {}
    }

    caps
}

fn wayland_socket(env: &dyn Environment) -> Option<PathBuf> {
    let display = env.var("WAYLAND_DISPLAY")?;
    let path = PathBuf::from(&display);
    if path.is_absolute() {
        return Some(path);
    }
    env.var("XDG_RUNTIME_DIR")
        .map(|dir| PathBuf::from(dir).join(display))
}

/// Local socket for a `:<n>[.screen]` display.
fn x11_socket(display: &str) -> Option<PathBuf> {
    let number = display.strip_prefix(':')?;
    let number = number.split('.').next()?;
    number.parse::<u32>().ok()?;
    Some(PathBuf::from(format!("/tmp/.X11-unix/X{number}")))
}

fn is_remote_display(display: &str) -> bool {
    display
        .split_once(':')
        .is_some_and(|(host, _)| !host.is_empty() && !host.starts_with('/'))
}
