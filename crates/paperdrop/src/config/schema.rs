use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest upload accepted by default (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
    /// SQLite file for job rows and processed documents. `None` uses
    /// `~/.paperdrop/data/paperdrop.db`.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub ocr: OcrConfig,
}

fn default_upload_directory() -> String {
    std::env::temp_dir()
        .join("pdf_uploads")
        .to_string_lossy()
        .to_string()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_job_timeout_secs() -> u64 {
    600
}

fn default_result_ttl_secs() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            upload_directory: default_upload_directory(),
            max_file_size: default_max_file_size(),
            worker_count: default_worker_count(),
            job_timeout_secs: default_job_timeout_secs(),
            result_ttl_secs: default_result_ttl_secs(),
            database: None,
            ocr: OcrConfig::default(),
        }
    }
}

impl Config {
    /// Resolves the database location, falling back to the per-user default.
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrConfig {
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Directory holding Tesseract's `*.traineddata`. `None` lets Tesseract
    /// use its compiled-in location.
    #[serde(default)]
    pub tessdata_dir: Option<String>,
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: default_languages(),
            dpi: default_dpi(),
            tessdata_dir: None,
        }
    }
}
