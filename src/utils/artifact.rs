//! Scoped cleanup for intermediate files
//!
//! Archives and database dumps only exist for the duration of one task. The
//! guard deletes the file on drop, which covers every exit path including
//! early returns through `?`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Deletes the wrapped path when dropped
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary artifact {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove temporary artifact {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
