//! File-based locking to prevent overlapping scheduled runs

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Exclusive lock guard for one backup run
pub struct RunLock {
    // Store the lock and its guard together
    _lock: Box<(RwLock<File>, Option<fd_lock::RwLockWriteGuard<'static, File>>)>,
    lock_path: PathBuf,
}

impl RunLock {
    /// Acquire an exclusive run lock
    /// Returns an error if another run already holds it
    pub fn acquire(name: &str) -> Result<Self> {
        let lock_path = Self::lock_path(name);

        debug!("Attempting to acquire run lock: {:?}", lock_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .context(format!("Failed to open lock file: {:?}", lock_path))?;

        let mut boxed_lock = Box::new((RwLock::new(file), None));

        // SAFETY: self-referential pair. The guard references the RwLock
        // stored in the same Box; the Box does not move, and the tuple's drop
        // order releases the guard before the lock it borrows from.
        let lock_ptr = &mut boxed_lock.0 as *mut RwLock<File>;
        let guard = unsafe { (*lock_ptr).try_write() }.context(format!(
            "A backup run named '{}' is already in progress (lock held)",
            name
        ))?;
        let static_guard: fd_lock::RwLockWriteGuard<'static, File> =
            unsafe { std::mem::transmute(guard) };
        boxed_lock.1 = Some(static_guard);

        info!("Acquired run lock: {}", name);

        Ok(Self {
            _lock: boxed_lock,
            lock_path,
        })
    }

    fn lock_path(name: &str) -> PathBuf {
        #[cfg(unix)]
        let base = Path::new("/tmp");

        #[cfg(windows)]
        let base = std::env::temp_dir();

        base.join(format!("backhaul-{}.lock", name))
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        info!("Released run lock: {:?}", self.lock_path);

        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            debug!("Failed to remove lock file: {}", e);
        }
    }
}
