//! Wallet directory lock
//!
//! A zero-length `wallet.lock` marker inside the wallet directory, held with
//! an OS advisory exclusive lock for the lifetime of one manager. A single
//! non-blocking attempt is made; failure means another manager process owns
//! the directory. Release is best-effort and never fails the caller.

use crate::error::{Result, WalletError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const LOCK_FILE_NAME: &str = "wallet.lock";

#[derive(Debug)]
pub struct DirectoryLock {
    path: PathBuf,
    file: File,
}

impl DirectoryLock {
    /// Create (or truncate) the marker and try once to lock it exclusively
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let unavailable = |reason: String| WalletError::DirectoryLockUnavailable {
            path: path.clone(),
            reason,
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| unavailable(format!("failed to open lock file: {}", e)))?;

        if let Err(e) = file.try_lock_exclusive() {
            return Err(unavailable(e.to_string()));
        }
        if !still_linked(&file, &path) {
            return Err(unavailable("lock marker was replaced while locking".into()));
        }

        info!(path = %path.display(), "wallet directory locked");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The locked handle is still the file at `path` (a releasing holder unlinks first)
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        // unlink while still locked so nobody can lock the marker we delete
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "lock marker not removed");
        }
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!(path = %self.path.display(), "wallet directory lock released"),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to unlock wallet directory")
            }
        }
    }
}
