use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The error taxonomy from `spec.md` §7. `Validation`/`Auth`/`NotFound` are
/// HTTP-layer only and never persisted on a job; only the first four are
/// ever written into [`ErrorInfo::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DownloadError,
    ExtractionError,
    TranscriptionError,
    ProcessingError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::DownloadError => "download_error",
            ErrorKind::ExtractionError => "extraction_error",
            ErrorKind::TranscriptionError => "transcription_error",
            ErrorKind::ProcessingError => "processing_error",
        };
        f.write_str(s)
    }
}

/// Structured error persisted on a failed job.
///
/// `details` is widened from the original's `Optional[str]` to a free-form
/// JSON value (`SPEC_FULL.md` §3), since Runner-produced details are
/// structured — e.g. a renderer's list of missing output formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
