pub mod chain;
pub mod cleanup;
pub mod config;
pub mod result;

pub use chain::{validate_upload, ExtractorChain};
pub use cleanup::TempFileGuard;
pub use config::ChainConfig;
pub use result::{ExtractionResult, ExtractionStatus};
