use std::path::PathBuf;

use crate::processor::MediaType;

/// One queued chain invocation. The upload at `upload_path` belongs to the
/// job and is deleted by the chain once it finishes.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    /// Original filename as submitted by the client.
    pub filename: String,
    pub upload_path: PathBuf,
    pub media_type: MediaType,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        upload_path: PathBuf,
        media_type: MediaType,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            upload_path,
            media_type,
        }
    }
}
