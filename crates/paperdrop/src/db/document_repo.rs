//! Processed document repository for the `processed_documents` table.
//!
//! One row per completed job, holding the extracted text. Rows outlive the
//! job row they came from; purging expired jobs leaves them in place.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRow {
    pub id: i64,
    pub job_id: String,
    pub document_name: String,
    pub original_filename: String,
    pub content: String,
    pub extraction_method: String,
    pub created_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            document_name: row.get("document_name")?,
            original_filename: row.get("original_filename")?,
            content: row.get("content")?,
            extraction_method: row.get("extraction_method")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Fields of a document about to be inserted; the id is assigned by SQLite.
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub job_id: &'a str,
    pub document_name: &'a str,
    pub original_filename: &'a str,
    pub content: &'a str,
    pub extraction_method: &'a str,
    pub created_at: &'a str,
}

/// Inserts a document and returns its row id.
pub fn insert(db: &Database, doc: &NewDocument<'_>) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processed_documents
             (job_id, document_name, original_filename, content, extraction_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.job_id,
                doc.document_name,
                doc.original_filename,
                doc.content,
                doc.extraction_method,
                doc.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_job_id(db: &Database, job_id: &str) -> Result<Option<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM processed_documents WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], DocumentRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists documents newest first.
pub fn list(db: &Database, limit: u64, offset: u64) -> Result<Vec<DocumentRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM processed_documents
             ORDER BY created_at DESC, id DESC
             LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], DocumentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
