//! Isolated environment for chain and tracker tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use paperdrop::jobs::TrackerConfig;
use paperdrop::processor::ExtractionBackend;
use paperdrop::{Database, ExtractorChain, JobTracker};

pub const MAX_FILE_SIZE: u64 = 64 * 1024;

pub struct TestHarness {
    temp_dir: TempDir,
    /// Where callers put the files they hand to the chain.
    pub input_dir: PathBuf,
    /// Where trackers store submitted uploads.
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    pub job_timeout: Duration,
    pub result_ttl: Duration,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let upload_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        Self {
            temp_dir,
            input_dir,
            upload_dir,
            max_file_size: MAX_FILE_SIZE,
            job_timeout: Duration::from_secs(10),
            result_ttl: Duration::from_secs(60),
        }
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn chain(&self, backends: Vec<Box<dyn ExtractionBackend>>) -> ExtractorChain {
        ExtractorChain::with_backends(backends, self.max_file_size)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            upload_directory: self.upload_dir.clone(),
            max_file_size: self.max_file_size,
            worker_count: 2,
            job_timeout: self.job_timeout,
            result_ttl: self.result_ttl,
        }
    }

    pub fn tracker(&self, backends: Vec<Box<dyn ExtractionBackend>>) -> JobTracker {
        self.tracker_with_db(backends, None)
    }

    pub fn tracker_with_db(
        &self,
        backends: Vec<Box<dyn ExtractionBackend>>,
        db: Option<Database>,
    ) -> JobTracker {
        JobTracker::with_chain(self.tracker_config(), self.chain(backends), db)
            .expect("Failed to create tracker")
    }

    pub fn database_path(&self) -> PathBuf {
        self.temp_dir.path().join("data").join("paperdrop.db")
    }

    pub fn open_database(&self) -> Database {
        Database::open(&self.database_path()).expect("Failed to open database")
    }

    /// Files currently left in the upload directory.
    pub fn upload_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(&self.upload_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
