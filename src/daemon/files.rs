//! Runtime directory files: compiled artifact, pid file and status file.

use crate::constants::{PID_FILE_NAME, STATUS_FILE_NAME};
use crate::daemon::state::StatusSnapshot;
use crate::error::DaemonError;
use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes `contents` to `path` via a sibling temp file and rename.
///
/// Readers never observe a partially written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)
}

/// Returns true if a process with `pid` exists.
#[must_use]
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Reads the pid recorded in `runtime_dir`, if any.
#[must_use]
pub fn read_pid(runtime_dir: &Path) -> Option<i32> {
    fs::read_to_string(runtime_dir.join(PID_FILE_NAME))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Pid of a live daemon owning `runtime_dir`.
#[must_use]
pub fn running_daemon(runtime_dir: &Path) -> Option<i32> {
    read_pid(runtime_dir).filter(|&pid| process_alive(pid))
}

/// Exclusive claim on a runtime directory, released on drop.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Records this process in `runtime_dir`.
    ///
    /// Fails if another live process already holds the file. A stale file
    /// left by a dead process is replaced.
    pub fn acquire(runtime_dir: &Path) -> Result<Self, DaemonError> {
        let own_pid = std::process::id();
        if let Some(pid) = running_daemon(runtime_dir) {
            if u32::try_from(pid).ok() != Some(own_pid) {
                return Err(DaemonError::AlreadyRunning(pid));
            }
        }

        let path = runtime_dir.join(PID_FILE_NAME);
        write_atomic(&path, format!("{own_pid}\n").as_bytes())
            .map_err(|e| DaemonError::RuntimeDir(format!("{}: {e}", path.display())))?;
        Ok(Self { path })
    }

    /// Location of the pid file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove pid file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Persists `snapshot` as JSON in `runtime_dir`.
pub fn write_status(runtime_dir: &Path, snapshot: &StatusSnapshot) -> Result<()> {
    let path = runtime_dir.join(STATUS_FILE_NAME);
    let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialize status")?;
    write_atomic(&path, &json).context(format!("Failed to write status file: {}", path.display()))
}

/// Loads the last status written to `runtime_dir`.
pub fn read_status(runtime_dir: &Path) -> Result<StatusSnapshot> {
    let path = runtime_dir.join(STATUS_FILE_NAME);
    let content = fs::read_to_string(&path)
        .context(format!("Failed to read status file: {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse status file: {}", path.display()))
}
