use serde::{Deserialize, Serialize};

use crate::error::ExtractError;
use crate::processor::{ExtractionAttempt, ExtractionMethod};

const ALL_FAILED_PREFIX: &str = "All extraction methods failed: ";

/// Label used in place of a method when no backend produced text.
pub const NO_METHOD: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Completed,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Failed => "failed",
        }
    }
}

/// Final outcome of one chain run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    #[serde(serialize_with = "serialize_method")]
    pub method: Option<ExtractionMethod>,
    pub status: ExtractionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn completed(method: ExtractionMethod, text: String) -> Self {
        Self {
            text,
            method: Some(method),
            status: ExtractionStatus::Completed,
            error: None,
        }
    }

    /// Aggregates every failed attempt, in the order they ran, into one
    /// `"All extraction methods failed: a: x | b: y"` message.
    pub fn all_failed(attempts: &[ExtractionAttempt]) -> Self {
        let details = attempts
            .iter()
            .map(ExtractionAttempt::describe_failure)
            .collect::<Vec<_>>()
            .join(" | ");

        Self::failure(format!("{}{}", ALL_FAILED_PREFIX, details))
    }

    pub fn failure(error: String) -> Self {
        Self {
            text: String::new(),
            method: None,
            status: ExtractionStatus::Failed,
            error: Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExtractionStatus::Completed
    }

    pub fn method_label(&self) -> &'static str {
        self.method.map(|m| m.as_str()).unwrap_or(NO_METHOD)
    }

    pub fn ok_or_error(self) -> Result<(String, ExtractionMethod), ExtractError> {
        match (self.status, self.method) {
            (ExtractionStatus::Completed, Some(method)) => Ok((self.text, method)),
            _ => Err(ExtractError::AllBackendsFailed(
                self.error
                    .unwrap_or_else(|| format!("{}no backends configured", ALL_FAILED_PREFIX)),
            )),
        }
    }
}

fn serialize_method<S>(method: &Option<ExtractionMethod>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(method.map(|m| m.as_str()).unwrap_or(NO_METHOD))
}
