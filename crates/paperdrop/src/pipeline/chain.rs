use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, info_span, warn};

use crate::error::{BackendError, ExtractError};
use crate::processor::{
    ExtractionAttempt, ExtractionBackend, ExtractionInput, ExtractionMethod, MediaType,
    OcrBackend, PartitionBackend, PdfLayoutBackend,
};
use crate::sanitize;

use super::cleanup::TempFileGuard;
use super::config::ChainConfig;
use super::result::ExtractionResult;

const PREVIEW_CHARS: usize = 60;

/// Ordered list of extraction backends; the first one that yields
/// non-empty text wins.
pub struct ExtractorChain {
    backends: Vec<Box<dyn ExtractionBackend>>,
    max_file_size: u64,
}

impl ExtractorChain {
    /// Production constructor: PDF layout, then OCR, then partitioning.
    pub fn from_config(config: &ChainConfig) -> Self {
        let backends: Vec<Box<dyn ExtractionBackend>> = vec![
            Box::new(PdfLayoutBackend::new()),
            Box::new(OcrBackend::new(
                &config.ocr_languages,
                config.ocr_dpi,
                config.tessdata_dir.clone(),
            )),
            Box::new(PartitionBackend::new()),
        ];

        Self::with_backends(backends, config.max_file_size)
    }

    pub fn with_backends(backends: Vec<Box<dyn ExtractionBackend>>, max_file_size: u64) -> Self {
        Self {
            backends,
            max_file_size,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn methods(&self) -> Vec<ExtractionMethod> {
        self.backends.iter().map(|b| b.method()).collect()
    }

    /// Runs the chain on the file at `path` and deletes it afterwards.
    ///
    /// Media type and size are checked before any backend runs. Backend
    /// failures never surface as `Err`; they are folded into a failed
    /// [`ExtractionResult`].
    pub fn run(&self, path: &Path, declared_type: &str) -> Result<ExtractionResult, ExtractError> {
        self.run_until(path, declared_type, None)
    }

    /// Like [`run`](Self::run), but no backend is started once `deadline`
    /// has passed and running backends see the deadline on their input.
    pub fn run_until(
        &self,
        path: &Path,
        declared_type: &str,
        deadline: Option<Instant>,
    ) -> Result<ExtractionResult, ExtractError> {
        let _guard = TempFileGuard::new(path);

        let filename = sanitize::redact_path(path);
        let _span = info_span!("chain", file = %filename, media_type = declared_type).entered();

        let media_type = MediaType::parse(declared_type)?;
        let size = std::fs::metadata(path)
            .map_err(|e| ExtractError::ReadDocument {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();
        check_size(size, self.max_file_size)?;

        let input = ExtractionInput::new(path, media_type).with_deadline(deadline);
        Ok(self.run_backends(&input))
    }

    fn run_backends(&self, input: &ExtractionInput<'_>) -> ExtractionResult {
        let mut attempts = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            let method = backend.method();
            let _span = info_span!("backend", method = %method).entered();

            if input.is_past_deadline() {
                warn!("Deadline passed, not starting {}", method);
                attempts.push(ExtractionAttempt::failed(
                    method,
                    BackendError::DeadlinePassed.to_string(),
                ));
                break;
            }

            let attempt = ExtractionAttempt::run(backend.as_ref(), input);
            if attempt.success {
                info!(
                    "Extracted {} chars with {}: {}",
                    attempt.text.chars().count(),
                    method,
                    sanitize::text_preview(&attempt.text, PREVIEW_CHARS)
                );
                return ExtractionResult::completed(attempt.method, attempt.text);
            }

            warn!("{} failed", attempt.describe_failure());
            attempts.push(attempt);
        }

        debug!("All {} backends failed", attempts.len());
        ExtractionResult::all_failed(&attempts)
    }
}

/// Checks a declared media type and byte size against the accepted set
/// and `limit`. A file of exactly `limit` bytes is accepted.
pub fn validate_upload(declared_type: &str, size: u64, limit: u64) -> Result<MediaType, ExtractError> {
    let media_type = MediaType::parse(declared_type)?;
    check_size(size, limit)?;
    Ok(media_type)
}

fn check_size(size: u64, limit: u64) -> Result<(), ExtractError> {
    if size > limit {
        return Err(ExtractError::SizeLimitExceeded { size, limit });
    }
    Ok(())
}
