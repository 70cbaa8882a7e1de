use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

/// Result of trying to take the refresh lock
#[derive(Debug)]
pub enum LockOutcome {
    /// We own the lock until the guard drops
    Acquired(LockGuard),
    /// A live refresh holds it
    Contended,
    /// An expired lock was removed; the caller must not generate this run
    StaleReclaimed,
}

/// Removes the lock file on drop, including on error and panic paths
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
            }
        }
    }
}

/// Create `path` exclusively, or classify the existing lock by its age
pub fn try_lock(path: &Path, expiry: Duration) -> Result<LockOutcome> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(LockOutcome::Acquired(LockGuard {
            path: path.to_path_buf(),
        })),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(inspect_existing(path, expiry)),
        Err(e) => Err(e).with_context(|| format!("Failed to create lock {}", path.display())),
    }
}

fn inspect_existing(path: &Path, expiry: Duration) -> LockOutcome {
    let age = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok());

    match age {
        Some(age) if age > expiry => match fs::remove_file(path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), ?age, "removed expired lock");
                LockOutcome::StaleReclaimed
            }
            // Another caller reclaimed it first
            Err(e) if e.kind() == ErrorKind::NotFound => LockOutcome::StaleReclaimed,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot remove expired lock");
                LockOutcome::Contended
            }
        },
        _ => LockOutcome::Contended,
    }
}
