//! Asynchronous job tracking around the extractor chain.

pub mod status;
pub mod store;
pub mod tracker;

pub use status::{JobStatus, JobStatusView, SubmitReceipt};
pub use store::{JobCounts, JobStore, StoredJob};
pub use tracker::{JobTracker, TrackerConfig, Upload};
