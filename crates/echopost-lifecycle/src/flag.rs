//! Exclusive-create marker for the accepting state.

use crate::{LifecycleError, LifecycleResult};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Marker file that exists while the agent buffers writes as its primary path.
///
/// Creation is exclusive, so at most one holder exists per base directory.
/// The file holds the owner's PID; a file left behind by an unclean exit is
/// visible to the next run.
#[derive(Debug)]
pub struct AcceptingFlag {
    path: PathBuf,
    held: bool,
}

impl AcceptingFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if this handle created the marker and has not released it.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Create the marker. Fails with [`LifecycleError::FlagAlreadyHeld`] if
    /// it already exists, including when this handle created it.
    pub fn acquire(&mut self) -> LifecycleResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => LifecycleError::FlagAlreadyHeld(self.path.clone()),
                _ => LifecycleError::Io(e),
            })?;
        self.held = true;

        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            debug!(error = %e, "accepting_flag_pid_write_error");
        }
        Ok(())
    }

    /// Remove the marker if this handle holds it.
    ///
    /// A handle that never acquired the marker, or already released it,
    /// leaves the file alone: it may belong to another agent.
    pub fn release(&mut self) -> LifecycleResult<()> {
        if !self.held {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.held = false;
        Ok(())
    }

    /// Remove a marker left by an earlier run. Returns whether one was removed.
    ///
    /// A marker naming a live process other than this one belongs to a
    /// running agent and yields [`LifecycleError::FlagAlreadyHeld`]; the file
    /// is kept. Unreadable PIDs and dead owners are stale.
    pub fn clear_stale(&self) -> LifecycleResult<bool> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let owner = contents.trim().parse::<u32>().ok();

        if let Some(pid) = owner {
            if pid != std::process::id() && process_alive(pid) {
                warn!(
                    path = %self.path.display(),
                    owner_pid = pid,
                    "accepting_flag_held_by_live_agent"
                );
                return Err(LifecycleError::FlagAlreadyHeld(self.path.clone()));
            }
        }

        warn!(
            path = %self.path.display(),
            previous_pid = ?owner,
            "stale_accepting_flag_found"
        );
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// True if `pid` names an existing process, including one owned by another user.
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 performs the existence and permission checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
