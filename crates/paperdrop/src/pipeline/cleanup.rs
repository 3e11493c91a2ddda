use std::path::{Path, PathBuf};

use tracing::{debug, error};

use crate::sanitize;

/// Deletes an uploaded file when dropped, on success, failure and unwind
/// alike. Removal errors are logged and swallowed.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {}", sanitize::redact_path(&self.path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!(
                "Failed to remove upload {}: {}",
                sanitize::redact_path(&self.path),
                e
            ),
        }
    }
}
