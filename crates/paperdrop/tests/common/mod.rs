//! Shared helpers for paperdrop integration tests.
//!
//! - `TestHarness` owns a temp directory with an uploads folder and builds
//!   chains and trackers around scripted backends
//! - builders create PDFs and scripted backends

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
