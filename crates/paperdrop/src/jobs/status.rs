use std::fmt;

use serde::{Deserialize, Serialize};

use crate::processor::ExtractionMethod;

/// Lifecycle of a job. Only moves forward: `Processing` to one of the
/// finished states, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a poll returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatusView {
    Processing,
    Completed {
        text: String,
        method: ExtractionMethod,
    },
    Failed {
        error: String,
    },
}

impl JobStatusView {
    pub fn status(&self) -> JobStatus {
        match self {
            JobStatusView::Processing => JobStatus::Processing,
            JobStatusView::Completed { .. } => JobStatus::Completed,
            JobStatusView::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Returned by `submit` before any extraction has happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: JobStatus,
    pub filename: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_strings() {
        for status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("queued"), None);
        assert!(!JobStatus::Processing.is_finished());
        assert!(JobStatus::Failed.is_finished());
    }

    #[test]
    fn test_view_wire_format() {
        assert_eq!(
            serde_json::to_value(JobStatusView::Processing).unwrap(),
            json!({"status": "processing"})
        );
        assert_eq!(
            serde_json::to_value(JobStatusView::Completed {
                text: "Hello World".to_string(),
                method: ExtractionMethod::Ocr,
            })
            .unwrap(),
            json!({"status": "completed", "text": "Hello World", "method": "ocr"})
        );
        assert_eq!(
            serde_json::to_value(JobStatusView::Failed {
                error: "boom".to_string()
            })
            .unwrap(),
            json!({"status": "failed", "error": "boom"})
        );
    }

    #[test]
    fn test_receipt_wire_format() {
        let receipt = SubmitReceipt {
            job_id: "abc".to_string(),
            status: JobStatus::Processing,
            filename: "scan.pdf".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            json!({"jobId": "abc", "status": "processing", "filename": "scan.pdf"})
        );
    }

    #[test]
    fn test_view_status() {
        let view = JobStatusView::Failed {
            error: "x".to_string(),
        };
        assert_eq!(view.status(), JobStatus::Failed);
    }
}
