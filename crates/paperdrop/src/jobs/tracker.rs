use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::config::Config;
use crate::db::{Database, DatabaseError};
use crate::error::JobError;
use crate::jobs::status::{JobStatus, JobStatusView, SubmitReceipt};
use crate::jobs::store::{JobCounts, JobStore, StoredJob};
use crate::pipeline::{validate_upload, ChainConfig, ExtractionResult, ExtractorChain, TempFileGuard};
use crate::processor::MediaType;
use crate::sanitize;
use crate::worker::{Job, WorkerPool};

/// Declared type used when none is given and the extension is unknown.
/// It is never accepted, so such uploads are rejected.
const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// Slack added to the job timeout when leasing a `processing` row, covering
/// the time between the deadline and the result being written.
const LEASE_GRACE: Duration = Duration::from_secs(30);

pub struct TrackerConfig {
    pub upload_directory: PathBuf,
    pub max_file_size: u64,
    pub worker_count: usize,
    pub job_timeout: Duration,
    pub result_ttl: Duration,
}

impl TrackerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            upload_directory: PathBuf::from(&config.upload_directory),
            max_file_size: config.max_file_size,
            worker_count: config.worker_count,
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            result_ttl: Duration::from_secs(config.result_ttl_secs),
        }
    }
}

enum UploadContent {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// A document handed to [`JobTracker::submit`].
pub struct Upload {
    pub filename: String,
    pub media_type: String,
    content: UploadContent,
}

impl Upload {
    pub fn from_bytes(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            content: UploadContent::Bytes(bytes),
        }
    }

    /// Uploads a copy of the file at `path`. Without an explicit media type
    /// one is guessed from the extension.
    pub fn from_path(path: impl Into<PathBuf>, media_type: Option<String>) -> Self {
        let path = path.into();
        let media_type = media_type
            .or_else(|| MediaType::guess_from_path(&path))
            .unwrap_or_else(|| UNKNOWN_MEDIA_TYPE.to_string());

        Self {
            filename: sanitize::redact_path(&path),
            media_type,
            content: UploadContent::File(path),
        }
    }

    fn size(&self) -> Result<u64, JobError> {
        match &self.content {
            UploadContent::Bytes(bytes) => Ok(bytes.len() as u64),
            UploadContent::File(path) => std::fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| JobError::Storage {
                    path: path.clone(),
                    source: e,
                }),
        }
    }

    fn write_to(&self, dest: &Path) -> Result<(), JobError> {
        let written = match &self.content {
            UploadContent::Bytes(bytes) => std::fs::write(dest, bytes),
            UploadContent::File(src) => std::fs::copy(src, dest).map(|_| ()),
        };
        written.map_err(|e| JobError::Storage {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}

/// Runs chain invocations as background jobs and answers status polls.
pub struct JobTracker {
    config: TrackerConfig,
    store: Arc<JobStore>,
    pool: WorkerPool,
}

impl JobTracker {
    /// Production constructor: the full backend chain, with jobs persisted
    /// to `db` when given.
    pub fn new(config: &Config, db: Option<Database>) -> Result<Self, JobError> {
        let chain = ExtractorChain::from_config(&ChainConfig::from_config(config));
        Self::with_chain(TrackerConfig::from_config(config), chain, db)
    }

    pub fn with_chain(
        config: TrackerConfig,
        chain: ExtractorChain,
        db: Option<Database>,
    ) -> Result<Self, JobError> {
        std::fs::create_dir_all(&config.upload_directory).map_err(|e| JobError::Storage {
            path: config.upload_directory.clone(),
            source: e,
        })?;

        let store = Arc::new(
            JobStore::new(config.result_ttl)
                .with_lease(config.job_timeout.saturating_add(LEASE_GRACE)),
        );
        if let Some(db) = db {
            store.set_database(db);
            if let Err(e) = store.fail_interrupted() {
                error!("Failed to fail interrupted jobs: {}", e);
            }
        }

        let pool = WorkerPool::new(
            Arc::new(chain),
            Arc::clone(&store),
            config.worker_count,
            config.job_timeout,
        );

        Ok(Self {
            config,
            store,
            pool,
        })
    }

    /// Validates and stores the upload, then queues it. Never waits for
    /// extraction. Rejected uploads leave no job and no file behind.
    pub fn submit(&self, upload: Upload) -> Result<SubmitReceipt, JobError> {
        let size = upload.size()?;
        let media_type = validate_upload(&upload.media_type, size, self.config.max_file_size)?;

        if self.pool.is_shutdown() {
            return Err(JobError::ShuttingDown);
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let upload_path = self
            .config
            .upload_directory
            .join(format!("{}.{}", job_id, media_type.extension()));
        upload.write_to(&upload_path)?;

        self.store
            .insert(StoredJob::processing(&job_id, &upload.filename, media_type));

        let job = Job::new(&job_id, &upload.filename, upload_path.clone(), media_type);
        if let Err(e) = self.pool.submit(job) {
            drop(TempFileGuard::new(upload_path));
            self.store
                .resolve(&job_id, &ExtractionResult::failure(e.to_string()));
            return Err(e);
        }

        info!(
            "Queued job {} for {} ({}, {} bytes)",
            job_id, upload.filename, media_type, size
        );

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Processing,
            filename: upload.filename,
        })
    }

    pub fn get_status(&self, job_id: &str) -> Result<JobStatusView, JobError> {
        self.get_job(job_id).map(|job| job.view())
    }

    pub fn get_job(&self, job_id: &str) -> Result<StoredJob, JobError> {
        self.store
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }

    /// Polls every `interval` until the job finishes or `max_wait` passes,
    /// returning the last view seen.
    pub fn wait_for(
        &self,
        job_id: &str,
        interval: Duration,
        max_wait: Duration,
    ) -> Result<JobStatusView, JobError> {
        let started = Instant::now();
        loop {
            let view = self.get_status(job_id)?;
            if view.status().is_finished() || started.elapsed() >= max_wait {
                return Ok(view);
            }
            std::thread::sleep(interval);
        }
    }

    pub fn purge_expired(&self) -> Result<usize, DatabaseError> {
        self.store.purge_expired()
    }

    pub fn counts(&self) -> JobCounts {
        self.store.counts()
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Stops accepting submissions; queued jobs still run before the
    /// workers are joined.
    pub fn shutdown(self) {
        self.pool.shutdown();
        self.pool.wait();
    }
}
