use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaperdropError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Chain-level failures. Per-backend failures never surface here; they are
/// folded into the aggregated [`ExtractionResult`](crate::pipeline::ExtractionResult).
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported media type '{declared}'. Supported types: {supported}")]
    UnsupportedMediaType { declared: String, supported: String },

    #[error("File size {size} bytes exceeds maximum limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    AllBackendsFailed(String),
}

/// Failure of a single extraction backend for a single file.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF syntax error: {0}")]
    PdfSyntax(String),

    #[error("not an image: {0}")]
    NotAnImage(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("PDF rasterization failed: {0}")]
    Rasterize(String),

    #[error("DOCX parsing failed: {0}")]
    Docx(String),

    #[error("empty document")]
    EmptyDocument,

    #[error("no structured text detected: {0}")]
    NoStructuredText(String),

    #[error("Failed to run {program}: {source}. Make sure it is installed.")]
    Tool {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("deadline passed")]
    DeadlinePassed,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job exceeded timeout of {limit:?}")]
    Timeout { limit: Duration },

    #[error("Submission rejected: {0}")]
    Rejected(#[from] ExtractError),

    #[error("Failed to store upload '{path}': {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Job tracker is shutting down")]
    ShuttingDown,
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to bridge log records: {0}")]
    Bridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub type Result<T> = std::result::Result<T, PaperdropError>;
