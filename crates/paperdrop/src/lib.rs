pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod processor;
pub mod sanitize;
pub mod worker;

pub use config::{load_config, Config};
pub use db::{Database, DatabaseError};
pub use error::{
    BackendError, ConfigError, ExtractError, JobError, LoggingError, PaperdropError, Result,
};
pub use jobs::{JobStatus, JobStatusView, JobTracker, SubmitReceipt, Upload};
pub use pipeline::{ChainConfig, ExtractionResult, ExtractionStatus, ExtractorChain};
pub use processor::{ExtractionBackend, ExtractionInput, ExtractionMethod, MediaType};
