//! CRUD for the `jobs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub media_type: String,
    pub status: String,
    pub text: Option<String>,
    pub method: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
    /// Set while `processing`; a worker owns the row until this passes.
    pub lease_expires_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            media_type: row.get("media_type")?,
            status: row.get("status")?,
            text: row.get("text")?,
            method: row.get("method")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
            lease_expires_at: row.get("lease_expires_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, filename, media_type, status, text, method, error,
             created_at, updated_at, completed_at, lease_expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.filename,
                job.media_type,
                job.status,
                job.text,
                job.method,
                job.error,
                job.created_at,
                job.updated_at,
                job.completed_at,
                job.lease_expires_at,
            ],
        )?;
        Ok(())
    })
}

/// Writes the outcome of a job that is still `processing` and drops its
/// lease. Returns 0 when the row is missing or already finished, in which
/// case nothing is changed.
pub fn finish(db: &Database, job: &JobRow) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET filename=?2, media_type=?3, status=?4, text=?5, method=?6,
             error=?7, updated_at=?8, completed_at=?9, lease_expires_at=NULL
             WHERE id=?1 AND status='processing'",
            params![
                job.id,
                job.filename,
                job.media_type,
                job.status,
                job.text,
                job.method,
                job.error,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(changed)
    })
}

/// Moves the lease of a `processing` job to `expires_at`. Returns 0 when
/// the row is missing or already finished.
pub fn renew_lease(db: &Database, id: &str, expires_at: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET lease_expires_at = ?2 WHERE id = ?1 AND status = 'processing'",
            params![id, expires_at],
        )?;
        Ok(changed)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Deletes finished jobs whose `completed_at` is strictly before `cutoff`
/// (RFC 3339, UTC). Returns the number of rows removed.
pub fn delete_completed_before(db: &Database, cutoff: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute(
            "DELETE FROM jobs
             WHERE status IN ('completed', 'failed')
               AND completed_at IS NOT NULL
               AND completed_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    })
}

/// Marks `processing` jobs whose lease ran out by `now` (or that never had
/// one) as failed with `error`. Rows leased by a live worker are left alone.
/// Returns the number of rows changed.
pub fn fail_processing(db: &Database, error: &str, now: &str) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE jobs SET status = 'failed', error = ?1, updated_at = ?2, completed_at = ?2,
                             lease_expires_at = NULL
             WHERE status = 'processing'
               AND (lease_expires_at IS NULL OR lease_expires_at <= ?2)",
            params![error, now],
        )?;
        Ok(changed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(id: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            filename: "scan.pdf".to_string(),
            media_type: "application/pdf".to_string(),
            status: "processing".to_string(),
            text: None,
            method: None,
            error: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
            completed_at: None,
            lease_expires_at: None,
        }
    }

    fn leased(id: &str, expires_at: &str) -> JobRow {
        let mut job = sample_job(id);
        job.lease_expires_at = Some(expires_at.to_string());
        job
    }

    fn finished(id: &str, status: &str, completed_at: &str) -> JobRow {
        let mut job = sample_job(id);
        job.status = status.to_string();
        job.completed_at = Some(completed_at.to_string());
        job
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let job = sample_job("job-1");
        insert(&db, &job).unwrap();

        let found = find_by_id(&db, "job-1").unwrap();
        assert_eq!(found, Some(job));
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        let found = find_by_id(&db, "nonexistent").unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let db = test_db();
        insert(&db, &sample_job("dup")).unwrap();
        assert!(matches!(
            insert(&db, &sample_job("dup")),
            Err(DatabaseError::Sqlite(_))
        ));
    }

    #[test]
    fn test_finish() {
        let db = test_db();
        let mut job = leased("job-2", "2026-01-01T00:10:00.000Z");
        insert(&db, &job).unwrap();

        job.status = "completed".to_string();
        job.text = Some("Hello World".to_string());
        job.method = Some("ocr".to_string());
        job.updated_at = "2026-01-01T00:01:00.000Z".to_string();
        job.completed_at = Some("2026-01-01T00:01:00.000Z".to_string());
        assert_eq!(finish(&db, &job).unwrap(), 1);

        let found = find_by_id(&db, "job-2").unwrap().unwrap();
        assert_eq!(found.status, "completed");
        assert!(found.lease_expires_at.is_none());
        assert_eq!(found.text.as_deref(), Some("Hello World"));
        assert_eq!(found.method.as_deref(), Some("ocr"));
        assert_eq!(found.created_at, "2026-01-01T00:00:00.000Z");
        assert!(found.completed_at.is_some());
    }

    #[test]
    fn test_finish_leaves_finished_rows_alone() {
        let db = test_db();
        insert(&db, &finished("done", "failed", "2026-01-01T00:00:05.000Z")).unwrap();

        let mut late = sample_job("done");
        late.status = "completed".to_string();
        late.text = Some("late text".to_string());
        late.method = Some("ocr".to_string());
        assert_eq!(finish(&db, &late).unwrap(), 0);
        assert_eq!(finish(&db, &sample_job("missing")).unwrap(), 0);

        let row = find_by_id(&db, "done").unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert!(row.text.is_none());
    }

    #[test]
    fn test_renew_lease() {
        let db = test_db();
        insert(&db, &leased("run", "2026-01-01T00:10:00.000Z")).unwrap();
        insert(&db, &finished("done", "completed", "2026-01-01T00:00:05.000Z")).unwrap();

        assert_eq!(renew_lease(&db, "run", "2026-01-01T01:00:00.000Z").unwrap(), 1);
        assert_eq!(renew_lease(&db, "done", "2026-01-01T01:00:00.000Z").unwrap(), 0);
        assert_eq!(
            find_by_id(&db, "run").unwrap().unwrap().lease_expires_at.as_deref(),
            Some("2026-01-01T01:00:00.000Z")
        );
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_job("c1")).unwrap();
        insert(&db, &sample_job("c2")).unwrap();
        insert(&db, &finished("c3", "failed", "2026-01-01T00:00:05.000Z")).unwrap();

        assert_eq!(count_by_status(&db, "processing").unwrap(), 2);
        assert_eq!(count_by_status(&db, "failed").unwrap(), 1);
        assert_eq!(count_by_status(&db, "completed").unwrap(), 0);
    }

    #[test]
    fn test_delete_completed_before() {
        let db = test_db();
        insert(&db, &finished("old-ok", "completed", "2026-01-01T00:00:00.000Z")).unwrap();
        insert(&db, &finished("old-bad", "failed", "2026-01-01T00:05:00.000Z")).unwrap();
        insert(&db, &finished("fresh", "completed", "2026-01-01T01:00:00.000Z")).unwrap();
        insert(&db, &sample_job("running")).unwrap();

        let removed = delete_completed_before(&db, "2026-01-01T00:30:00.000Z").unwrap();

        assert_eq!(removed, 2);
        assert!(find_by_id(&db, "old-ok").unwrap().is_none());
        assert!(find_by_id(&db, "old-bad").unwrap().is_none());
        assert!(find_by_id(&db, "fresh").unwrap().is_some());
        assert!(find_by_id(&db, "running").unwrap().is_some());
    }

    #[test]
    fn test_fail_processing() {
        let db = test_db();
        insert(&db, &sample_job("p1")).unwrap();
        insert(&db, &leased("expired", "2026-01-01T23:59:59.999Z")).unwrap();
        insert(&db, &leased("live", "2026-01-02T00:05:00.000Z")).unwrap();
        insert(&db, &finished("done", "completed", "2026-01-01T00:00:01.000Z")).unwrap();

        let changed =
            fail_processing(&db, "interrupted", "2026-01-02T00:00:00.000Z").unwrap();

        assert_eq!(changed, 2);
        assert_eq!(find_by_id(&db, "expired").unwrap().unwrap().status, "failed");
        let live = find_by_id(&db, "live").unwrap().unwrap();
        assert_eq!(live.status, "processing");
        assert!(live.error.is_none());
        let row = find_by_id(&db, "p1").unwrap().unwrap();
        assert_eq!(row.status, "failed");
        assert_eq!(row.error.as_deref(), Some("interrupted"));
        assert_eq!(row.completed_at.as_deref(), Some("2026-01-02T00:00:00.000Z"));
        assert_eq!(
            find_by_id(&db, "done").unwrap().unwrap().status,
            "completed"
        );
    }
}
