//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Creating the database directory failed.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored column holds a value this build does not understand.
    #[error("Invalid value '{value}' in column {column} for row {row_id}")]
    InvalidValue {
        row_id: String,
        column: &'static str,
        value: String,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,
}
