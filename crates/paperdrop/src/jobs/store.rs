//! Job store with optional persistent database storage.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::db::document_repo::{self, NewDocument};
use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::jobs::status::{JobStatus, JobStatusView};
use crate::pipeline::{ExtractionResult, ExtractionStatus};
use crate::processor::{ExtractionMethod, MediaType};

/// Error recorded for jobs left `processing` by a previous run.
pub const INTERRUPTED_ERROR: &str = "Job interrupted before completion";

/// Lease used when the owner does not set one.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(15 * 60);

// ─── Helpers ────────────────────────────────────────────────────────────────

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

/// Fixed-width UTC timestamps so they also compare correctly as text in SQL.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

// ─── StoredJob ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredJob {
    pub id: String,
    pub filename: String,
    pub media_type: MediaType,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ExtractionMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StoredJob {
    /// A freshly submitted job.
    pub fn processing(id: impl Into<String>, filename: impl Into<String>, media_type: MediaType) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            filename: filename.into(),
            media_type,
            status: JobStatus::Processing,
            text: None,
            method: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Creates a StoredJob from a database row, rejecting values this build
    /// cannot represent.
    pub fn from_job_row(row: &JobRow) -> Result<Self, DatabaseError> {
        let invalid = |column: &'static str, value: &str| DatabaseError::InvalidValue {
            row_id: row.id.clone(),
            column,
            value: value.to_string(),
        };

        let status = JobStatus::parse(&row.status).ok_or_else(|| invalid("status", &row.status))?;
        let media_type =
            MediaType::parse(&row.media_type).map_err(|_| invalid("media_type", &row.media_type))?;
        let method = match row.method.as_deref() {
            Some(m) => Some(ExtractionMethod::parse(m).ok_or_else(|| invalid("method", m))?),
            None => None,
        };
        if status == JobStatus::Completed && method.is_none() {
            return Err(invalid("method", ""));
        }

        Ok(Self {
            id: row.id.clone(),
            filename: row.filename.clone(),
            media_type,
            status,
            text: row.text.clone(),
            method,
            error: row.error.clone(),
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            completed_at: row.completed_at.as_deref().map(parse_timestamp),
        })
    }

    pub fn to_job_row(&self) -> JobRow {
        JobRow {
            id: self.id.clone(),
            filename: self.filename.clone(),
            media_type: self.media_type.as_str().to_string(),
            status: self.status.as_str().to_string(),
            text: self.text.clone(),
            method: self.method.map(|m| m.as_str().to_string()),
            error: self.error.clone(),
            created_at: format_timestamp(self.created_at),
            updated_at: format_timestamp(self.updated_at),
            completed_at: self.completed_at.map(format_timestamp),
            lease_expires_at: None,
        }
    }

    /// Name the upload was stored under while it was being processed.
    pub fn document_name(&self) -> String {
        format!("{}.{}", self.id, self.media_type.extension())
    }

    pub fn view(&self) -> JobStatusView {
        match (self.status, self.method) {
            (JobStatus::Processing, _) => JobStatusView::Processing,
            (JobStatus::Completed, Some(method)) => JobStatusView::Completed {
                text: self.text.clone().unwrap_or_default(),
                method,
            },
            (JobStatus::Completed, None) | (JobStatus::Failed, _) => JobStatusView::Failed {
                error: self.error.clone().unwrap_or_default(),
            },
        }
    }

    /// True once `ttl` has passed since the job finished.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.completed_at {
            Some(completed_at) => now - completed_at > to_chrono(ttl),
            None => false,
        }
    }

    fn apply(&mut self, result: &ExtractionResult, now: DateTime<Utc>) {
        match result.status {
            ExtractionStatus::Completed => {
                self.status = JobStatus::Completed;
                self.text = Some(result.text.clone());
                self.method = result.method;
                self.error = None;
            }
            ExtractionStatus::Failed => {
                self.status = JobStatus::Failed;
                self.text = None;
                self.method = None;
                self.error = result.error.clone();
            }
        }
        self.updated_at = now;
        self.completed_at = Some(now);
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

// ─── JobStore ───────────────────────────────────────────────────────────────

/// Job store: an in-memory cache in front of an optional SQLite database.
///
/// The cache holds every job submitted by this process. Lookups that miss
/// the cache fall back to the database, so jobs from an earlier run stay
/// pollable until their retention window passes.
///
/// Several processes may share one database. Each persisted `processing`
/// row carries a lease; only rows whose lease has lapsed count as
/// interrupted, and a resolution only lands on a row that is still
/// `processing`.
pub struct JobStore {
    db: RwLock<Option<Database>>,
    cache: RwLock<HashMap<String, StoredJob>>,
    result_ttl: Duration,
    lease: Duration,
}

impl JobStore {
    pub fn new(result_ttl: Duration) -> Self {
        Self {
            db: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
            result_ttl,
            lease: DEFAULT_LEASE,
        }
    }

    /// How long a `processing` row stays claimed by this store after it is
    /// inserted or started.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn result_ttl(&self) -> Duration {
        self.result_ttl
    }

    pub fn set_database(&self, db: Database) {
        let mut guard = match self.db.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        *guard = Some(db);
    }

    /// Gets a cloned database handle if available.
    pub fn get_database(&self) -> Option<Database> {
        let guard = match self.db.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Job store DB lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        guard.clone()
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, HashMap<String, StoredJob>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, HashMap<String, StoredJob>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store cache lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn lease_deadline(&self, now: DateTime<Utc>) -> String {
        let expires = now
            .checked_add_signed(to_chrono(self.lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        format_timestamp(expires)
    }

    /// Adds a new job to the cache and persists it under a fresh lease.
    pub fn insert(&self, job: StoredJob) {
        if let Some(db) = self.get_database() {
            let mut row = job.to_job_row();
            if job.status == JobStatus::Processing {
                row.lease_expires_at = Some(self.lease_deadline(Utc::now()));
            }
            if let Err(e) = job_repo::insert(&db, &row) {
                log::error!("Failed to persist job {}: {}", job.id, e);
            }
        }

        self.write_cache().insert(job.id.clone(), job);
    }

    /// Claims a queued job for a worker by renewing its lease.
    ///
    /// Returns `false` when the job is unknown or already finished, for
    /// instance because another process failed it while it sat in the queue.
    pub fn begin(&self, job_id: &str) -> bool {
        match self.read_cache().get(job_id) {
            Some(job) if !job.status.is_finished() => {}
            _ => return false,
        }

        let Some(db) = self.get_database() else {
            return true;
        };
        match job_repo::renew_lease(&db, job_id, &self.lease_deadline(Utc::now())) {
            Ok(0) => !self.adopt_persisted(&db, job_id),
            Ok(_) => true,
            Err(e) => {
                log::error!("Failed to renew lease of job {}: {}", job_id, e);
                true
            }
        }
    }

    /// Replaces the cached job with its persisted row after another process
    /// finished it. Returns `false` when there is no finished row to adopt,
    /// for instance because the job was never persisted.
    fn adopt_persisted(&self, db: &Database, job_id: &str) -> bool {
        let row = match job_repo::find_by_id(db, job_id) {
            Ok(Some(row)) => row,
            Ok(None) => {
                log::warn!("Job {} is missing from the database", job_id);
                return false;
            }
            Err(e) => {
                log::error!("Failed to load job {}: {}", job_id, e);
                return false;
            }
        };
        match StoredJob::from_job_row(&row) {
            Ok(job) if job.status.is_finished() => {
                log::warn!("Job {} was already {} in the database", job_id, job.status);
                self.write_cache().insert(job.id.clone(), job);
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::error!("Unreadable job row {}: {}", job_id, e);
                false
            }
        }
    }

    /// Records the outcome of a job.
    ///
    /// Returns `false` without changing anything when the job is unknown or
    /// already finished, here or in the database: status only moves forward.
    pub fn resolve(&self, job_id: &str, result: &ExtractionResult) -> bool {
        let mut resolved = match self.read_cache().get(job_id) {
            Some(job) => job.clone(),
            None => {
                log::warn!("Cannot resolve unknown job {}", job_id);
                return false;
            }
        };
        if resolved.status.is_finished() {
            log::debug!(
                "Ignoring second resolution of job {} (already {})",
                job_id,
                resolved.status
            );
            return false;
        }
        resolved.apply(result, Utc::now());

        let db = self.get_database();
        if let Some(db) = &db {
            match job_repo::finish(db, &resolved.to_job_row()) {
                Ok(0) if self.adopt_persisted(db, job_id) => return false,
                Ok(_) => {}
                Err(e) => log::error!("Failed to persist resolution of job {}: {}", job_id, e),
            }
        }

        {
            let mut cache = self.write_cache();
            match cache.get(job_id) {
                Some(current) if current.status.is_finished() => return false,
                _ => {
                    cache.insert(resolved.id.clone(), resolved.clone());
                }
            }
        }

        log::info!("Job {} {}", resolved.id, resolved.status);

        if let Some(db) = &db {
            if let Err(e) = store_document(db, &resolved) {
                log::error!("Failed to store document for job {}: {}", resolved.id, e);
            }
        }

        true
    }

    /// Returns a job by ID, checking the cache then the database. Jobs past
    /// their retention window are reported as absent.
    pub fn get(&self, job_id: &str) -> Option<StoredJob> {
        let now = Utc::now();

        if let Some(job) = self.read_cache().get(job_id) {
            return (!job.is_expired(now, self.result_ttl)).then(|| job.clone());
        }

        let db = self.get_database()?;
        match job_repo::find_by_id(&db, job_id) {
            Ok(Some(row)) => match StoredJob::from_job_row(&row) {
                Ok(job) if !job.is_expired(now, self.result_ttl) => Some(job),
                Ok(_) => None,
                Err(e) => {
                    log::error!("Unreadable job row {}: {}", job_id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::error!("Failed to load job {}: {}", job_id, e);
                None
            }
        }
    }

    /// Removes finished jobs whose retention window has passed, from the
    /// cache and the database. Returns how many jobs were removed.
    pub fn purge_expired(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now();

        let from_cache = {
            let mut cache = self.write_cache();
            let before = cache.len();
            cache.retain(|_, job| !job.is_expired(now, self.result_ttl));
            before - cache.len()
        };

        let from_db = match self.get_database() {
            Some(db) => {
                let cutoff = now
                    .checked_sub_signed(to_chrono(self.result_ttl))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                job_repo::delete_completed_before(&db, &format_timestamp(cutoff))?
            }
            None => 0,
        };

        let removed = from_cache.max(from_db);
        if removed > 0 {
            log::info!("Purged {} expired jobs", removed);
        }
        Ok(removed)
    }

    /// Returns job counts by status, from the database when available.
    pub fn counts(&self) -> JobCounts {
        if let Some(db) = self.get_database() {
            let count = |status: JobStatus| {
                job_repo::count_by_status(&db, status.as_str()).unwrap_or_else(|e| {
                    log::error!("Failed to count {} jobs: {}", status, e);
                    0
                })
            };
            return JobCounts {
                processing: count(JobStatus::Processing),
                completed: count(JobStatus::Completed),
                failed: count(JobStatus::Failed),
            };
        }

        let mut counts = JobCounts::default();
        for job in self.read_cache().values() {
            match job.status {
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Fails persisted `processing` jobs whose lease has lapsed. Their owner
    /// died with work in flight; rows still leased belong to a live process
    /// and are left alone.
    pub fn fail_interrupted(&self) -> Result<usize, DatabaseError> {
        let Some(db) = self.get_database() else {
            return Ok(0);
        };
        let failed =
            job_repo::fail_processing(&db, INTERRUPTED_ERROR, &format_timestamp(Utc::now()))?;
        if failed > 0 {
            log::warn!("Marked {} interrupted jobs as failed", failed);
        }
        Ok(failed)
    }
}

fn store_document(db: &Database, job: &StoredJob) -> Result<(), DatabaseError> {
    let (JobStatus::Completed, Some(method)) = (job.status, job.method) else {
        return Ok(());
    };
    document_repo::insert(
        db,
        &NewDocument {
            job_id: &job.id,
            document_name: &job.document_name(),
            original_filename: &job.filename,
            content: job.text.as_deref().unwrap_or_default(),
            extraction_method: method.as_str(),
            created_at: &format_timestamp(job.updated_at),
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::ExtractionAttempt;

    fn store_with_db(ttl: Duration) -> (JobStore, Database) {
        let db = Database::open_in_memory().unwrap();
        let store = JobStore::new(ttl);
        store.set_database(db.clone());
        (store, db)
    }

    fn completed(text: &str) -> ExtractionResult {
        ExtractionResult::completed(ExtractionMethod::Ocr, text.to_string())
    }

    #[test]
    fn test_insert_and_get_processing() {
        let store = JobStore::new(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "scan.pdf", MediaType::Pdf));

        let job = store.get("j1").unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.view(), JobStatusView::Processing);
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_resolve_is_forward_only() {
        let store = JobStore::new(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "scan.pdf", MediaType::Pdf));

        assert!(store.resolve("j1", &completed("Hello World")));
        assert!(!store.resolve("j1", &ExtractionResult::failure("late".to_string())));

        let job = store.get("j1").unwrap();
        assert_eq!(
            job.view(),
            JobStatusView::Completed {
                text: "Hello World".to_string(),
                method: ExtractionMethod::Ocr,
            }
        );
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_resolve_unknown_job() {
        let store = JobStore::new(Duration::from_secs(60));
        assert!(!store.resolve("ghost", &completed("x")));
    }

    #[test]
    fn test_failed_view_carries_error() {
        let store = JobStore::new(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "blank.pdf", MediaType::Pdf));
        let attempts = [ExtractionAttempt::failed(ExtractionMethod::PdfLayout, "empty")];
        store.resolve("j1", &ExtractionResult::all_failed(&attempts));

        assert_eq!(
            store.get("j1").unwrap().view(),
            JobStatusView::Failed {
                error: "All extraction methods failed: pdf_layout: empty".to_string()
            }
        );
    }

    #[test]
    fn test_resolution_persisted_with_document() {
        let (store, db) = store_with_db(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "receipt.png", MediaType::Png));
        store.resolve("j1", &completed("Total 12.00"));

        let row = job_repo::find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.method.as_deref(), Some("ocr"));
        assert_eq!(row.text.as_deref(), Some("Total 12.00"));

        let doc = document_repo::find_by_job_id(&db, "j1").unwrap().unwrap();
        assert_eq!(doc.document_name, "j1.png");
        assert_eq!(doc.original_filename, "receipt.png");
        assert_eq!(doc.content, "Total 12.00");
    }

    #[test]
    fn test_failed_job_stores_no_document() {
        let (store, db) = store_with_db(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "x.pdf", MediaType::Pdf));
        store.resolve("j1", &ExtractionResult::failure("nope".to_string()));

        assert!(document_repo::find_by_job_id(&db, "j1").unwrap().is_none());
    }

    #[test]
    fn test_get_falls_back_to_database() {
        let (store, db) = store_with_db(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "scan.pdf", MediaType::Pdf));
        store.resolve("j1", &completed("from disk"));

        let fresh = JobStore::new(Duration::from_secs(60));
        fresh.set_database(db);
        let job = fresh.get("j1").unwrap();
        assert_eq!(job.text.as_deref(), Some("from disk"));
        assert_eq!(job.method, Some(ExtractionMethod::Ocr));
    }

    #[test]
    fn test_expired_jobs_are_not_found() {
        let store = JobStore::new(Duration::ZERO);
        store.insert(StoredJob::processing("j1", "scan.pdf", MediaType::Pdf));
        store.resolve("j1", &completed("text"));
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get("j1").is_none());
    }

    #[test]
    fn test_processing_jobs_never_expire() {
        let job = StoredJob::processing("j1", "scan.pdf", MediaType::Pdf);
        let far_future = Utc::now() + chrono::Duration::days(365);
        assert!(!job.is_expired(far_future, Duration::ZERO));
    }

    #[test]
    fn test_is_expired_boundary() {
        let mut job = StoredJob::processing("j1", "scan.pdf", MediaType::Pdf);
        let done = Utc::now();
        job.completed_at = Some(done);
        let ttl = Duration::from_secs(500);

        assert!(!job.is_expired(done + chrono::Duration::seconds(500), ttl));
        assert!(job.is_expired(done + chrono::Duration::seconds(501), ttl));
    }

    #[test]
    fn test_purge_expired() {
        let (store, db) = store_with_db(Duration::ZERO);
        store.insert(StoredJob::processing("done", "a.pdf", MediaType::Pdf));
        store.insert(StoredJob::processing("running", "b.pdf", MediaType::Pdf));
        store.resolve("done", &completed("text"));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert!(job_repo::find_by_id(&db, "done").unwrap().is_none());
        assert!(job_repo::find_by_id(&db, "running").unwrap().is_some());
        // Documents outlive their job rows.
        assert!(document_repo::find_by_job_id(&db, "done").unwrap().is_some());
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_counts() {
        let store = JobStore::new(Duration::from_secs(60));
        store.insert(StoredJob::processing("a", "a.pdf", MediaType::Pdf));
        store.insert(StoredJob::processing("b", "b.pdf", MediaType::Pdf));
        store.insert(StoredJob::processing("c", "c.pdf", MediaType::Pdf));
        store.resolve("b", &completed("x"));
        store.resolve("c", &ExtractionResult::failure("y".to_string()));

        assert_eq!(
            store.counts(),
            JobCounts {
                processing: 1,
                completed: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_fail_interrupted() {
        let db = Database::open_in_memory().unwrap();
        let crashed = JobStore::new(Duration::from_secs(60)).with_lease(Duration::ZERO);
        crashed.set_database(db.clone());
        crashed.insert(StoredJob::processing("stale", "a.pdf", MediaType::Pdf));

        let restarted = JobStore::new(Duration::from_secs(60));
        restarted.set_database(db);
        assert_eq!(restarted.fail_interrupted().unwrap(), 1);

        assert_eq!(
            restarted.get("stale").unwrap().view(),
            JobStatusView::Failed {
                error: INTERRUPTED_ERROR.to_string()
            }
        );
        assert_eq!(JobStore::new(Duration::ZERO).fail_interrupted().unwrap(), 0);
    }

    #[test]
    fn test_fail_interrupted_spares_leased_jobs() {
        let (live, db) = store_with_db(Duration::from_secs(60));
        live.insert(StoredJob::processing("running", "a.pdf", MediaType::Pdf));

        let other = JobStore::new(Duration::from_secs(60));
        other.set_database(db.clone());
        assert_eq!(other.fail_interrupted().unwrap(), 0);

        let row = job_repo::find_by_id(&db, "running").unwrap().unwrap();
        assert_eq!(row.status, "processing");
        assert!(row.lease_expires_at.is_some());
    }

    #[test]
    fn test_resolution_clears_lease() {
        let (store, db) = store_with_db(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "a.pdf", MediaType::Pdf));
        store.resolve("j1", &completed("done"));

        let row = job_repo::find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert!(row.lease_expires_at.is_none());
    }

    #[test]
    fn test_resolve_after_failure_elsewhere_keeps_database_state() {
        let db = Database::open_in_memory().unwrap();
        let owner = JobStore::new(Duration::from_secs(60)).with_lease(Duration::ZERO);
        owner.set_database(db.clone());
        owner.insert(StoredJob::processing("j1", "scan.pdf", MediaType::Pdf));

        let other = JobStore::new(Duration::from_secs(60));
        other.set_database(db.clone());
        assert_eq!(other.fail_interrupted().unwrap(), 1);

        assert!(!owner.resolve("j1", &completed("late text")));

        let row = job_repo::find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert_eq!(row.error.as_deref(), Some(INTERRUPTED_ERROR));
        assert!(document_repo::find_by_job_id(&db, "j1").unwrap().is_none());
        assert_eq!(
            owner.get("j1").unwrap().view(),
            JobStatusView::Failed {
                error: INTERRUPTED_ERROR.to_string()
            }
        );
    }

    #[test]
    fn test_begin_claims_processing_jobs_only() {
        let db = Database::open_in_memory().unwrap();
        let store = JobStore::new(Duration::from_secs(60)).with_lease(Duration::ZERO);
        store.set_database(db.clone());
        store.insert(StoredJob::processing("lost", "b.pdf", MediaType::Pdf));

        let other = JobStore::new(Duration::from_secs(60));
        other.set_database(db.clone());
        other.fail_interrupted().unwrap();

        assert!(!store.begin("lost"));
        assert_eq!(store.get("lost").unwrap().status, JobStatus::Failed);
        assert!(!store.begin("missing"));

        let fresh = JobStore::new(Duration::from_secs(60));
        fresh.set_database(db.clone());
        fresh.insert(StoredJob::processing("next", "c.pdf", MediaType::Pdf));
        assert!(fresh.begin("next"));
        let row = job_repo::find_by_id(&db, "next").unwrap().unwrap();
        assert!(row.lease_expires_at.is_some());
    }

    #[test]
    fn test_resolve_job_missing_from_database() {
        let store = JobStore::new(Duration::from_secs(60));
        store.insert(StoredJob::processing("memory-only", "a.pdf", MediaType::Pdf));
        store.set_database(Database::open_in_memory().unwrap());

        assert!(store.begin("memory-only"));
        assert!(store.resolve("memory-only", &completed("kept")));
        assert_eq!(store.get("memory-only").unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_begin_without_database() {
        let store = JobStore::new(Duration::from_secs(60));
        store.insert(StoredJob::processing("j1", "a.pdf", MediaType::Pdf));
        assert!(store.begin("j1"));
        store.resolve("j1", &completed("x"));
        assert!(!store.begin("j1"));
    }

    #[test]
    fn test_row_round_trip_and_validation() {
        let mut job = StoredJob::processing("j1", "scan.tiff", MediaType::Tiff);
        job.apply(&completed("text"), Utc::now());

        let row = job.to_job_row();
        assert_eq!(row.media_type, "image/tiff");
        let restored = StoredJob::from_job_row(&row).unwrap();
        assert_eq!(restored.view(), job.view());

        let mut bad = row.clone();
        bad.method = None;
        assert!(matches!(
            StoredJob::from_job_row(&bad),
            Err(DatabaseError::InvalidValue { column: "method", .. })
        ));

        let mut bad = row;
        bad.status = "queued".to_string();
        assert!(matches!(
            StoredJob::from_job_row(&bad),
            Err(DatabaseError::InvalidValue { column: "status", .. })
        ));
    }
}
