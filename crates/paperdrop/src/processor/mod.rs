//! Text extraction backends and the types they share with the chain.

pub mod docx;
pub mod ocr;
pub mod partition;
pub mod pdf;
pub mod subprocess;

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ExtractError};

pub use ocr::OcrBackend;
pub use partition::{PartitionBackend, Segment};
pub use pdf::PdfLayoutBackend;

/// Detail recorded when a backend returns only whitespace.
pub const NO_TEXT_EXTRACTED: &str = "no text extracted";

/// Media types accepted for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/tiff")]
    Tiff,
}

impl MediaType {
    pub const SUPPORTED: [MediaType; 4] = [
        MediaType::Pdf,
        MediaType::Png,
        MediaType::Jpeg,
        MediaType::Tiff,
    ];

    /// Parses a declared content type. Parameters (`; charset=...`) are
    /// ignored and the comparison is case-insensitive.
    pub fn parse(declared: &str) -> Result<Self, ExtractError> {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        Self::SUPPORTED
            .into_iter()
            .find(|m| m.as_str() == essence)
            .ok_or_else(|| ExtractError::UnsupportedMediaType {
                declared: declared.to_string(),
                supported: Self::supported_list(),
            })
    }

    /// Guesses the declared type of a file from its extension.
    /// Returns `None` for unknown extensions.
    pub fn guess_from_path(path: &Path) -> Option<String> {
        mime_guess::from_path(path).first().map(|m| m.to_string())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Tiff => "image/tiff",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Pdf => "pdf",
            MediaType::Png => "png",
            MediaType::Jpeg => "jpg",
            MediaType::Tiff => "tiff",
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, MediaType::Pdf)
    }

    fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of an extraction backend, in the order the chain tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PdfLayout,
    Ocr,
    Partition,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PdfLayout => "pdf_layout",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Partition => "partition",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf_layout" => Some(ExtractionMethod::PdfLayout),
            "ocr" => Some(ExtractionMethod::Ocr),
            "partition" => Some(ExtractionMethod::Partition),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file handed to a backend, already validated for type and size.
///
/// Backends that loop or spawn tools are expected to stop once `deadline`
/// has passed.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub path: &'a Path,
    pub media_type: MediaType,
    pub deadline: Option<Instant>,
}

impl<'a> ExtractionInput<'a> {
    pub fn new(path: &'a Path, media_type: MediaType) -> Self {
        Self {
            path,
            media_type,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check_deadline(&self) -> Result<(), BackendError> {
        if self.is_past_deadline() {
            Err(BackendError::DeadlinePassed)
        } else {
            Ok(())
        }
    }

    pub fn read(&self) -> Result<Vec<u8>, BackendError> {
        std::fs::read(self.path).map_err(|e| BackendError::ReadDocument {
            path: self.path.to_path_buf(),
            source: e,
        })
    }

    pub fn filename(&self) -> String {
        crate::sanitize::redact_path(self.path)
    }
}

pub trait ExtractionBackend: Send + Sync {
    fn method(&self) -> ExtractionMethod;
    fn extract(&self, input: &ExtractionInput<'_>) -> Result<String, BackendError>;
}

/// One backend's outcome for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionAttempt {
    pub method: ExtractionMethod,
    pub text: String,
    pub success: bool,
    pub error: Option<String>,
}

impl ExtractionAttempt {
    pub fn succeeded(method: ExtractionMethod, text: String) -> Self {
        Self {
            method,
            text,
            success: true,
            error: None,
        }
    }

    pub fn failed(method: ExtractionMethod, error: impl Into<String>) -> Self {
        Self {
            method,
            text: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// Runs `backend` against `input`. Errors and panics become a failed
    /// attempt; whitespace-only text counts as a failure too.
    pub fn run(backend: &dyn ExtractionBackend, input: &ExtractionInput<'_>) -> Self {
        let method = backend.method();

        match panic::catch_unwind(AssertUnwindSafe(|| backend.extract(input))) {
            Ok(Ok(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Self::failed(method, NO_TEXT_EXTRACTED)
                } else {
                    Self::succeeded(method, trimmed.to_string())
                }
            }
            Ok(Err(e)) => Self::failed(method, e.to_string()),
            Err(payload) => Self::failed(
                method,
                format!("backend panicked: {}", panic_message(payload.as_ref())),
            ),
        }
    }

    /// `"<method>: <detail>"`, the form used in aggregated errors.
    pub fn describe_failure(&self) -> String {
        format!(
            "{}: {}",
            self.method,
            self.error.as_deref().unwrap_or(NO_TEXT_EXTRACTED)
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
