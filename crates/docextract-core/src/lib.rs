use std::time::Duration;

use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod context;
pub mod mock;
pub mod payload;
pub mod service;
pub mod text;

// Re-export for convenience
pub use backend::{ParserBackend, ParserSession};
pub use context::ParserContext;
pub use payload::DocumentPayload;
pub use service::{CleanupPolicy, Extraction, ExtractionOptions, ExtractionService, extract_blocking};
pub use text::normalize_page_text;

/// Errors surfaced by a single extraction call.
///
/// Every variant reaches the immediate caller unchanged; nothing is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The payload is empty, lacks a PDF header, or the parser refused to open it.
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    /// The parser opened the document but failed while reading it.
    #[error("parser failure: {0}")]
    ParserFailure(String),
    /// Releasing the parser context failed.
    #[error("failed to release parser context: {0}")]
    ResourceCleanupFailure(String),
    #[error("extraction cancelled")]
    Cancelled,
    #[error("extraction timed out after {:?}", .0)]
    TimedOut(Duration),
}

/// Fieldless discriminant of [`ExtractionError`], for callers that branch on
/// the failure class without caring about the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedDocument,
    ParserFailure,
    ResourceCleanupFailure,
    Cancelled,
    TimedOut,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedDocument => "malformed_document",
            ErrorKind::ParserFailure => "parser_failure",
            ErrorKind::ResourceCleanupFailure => "resource_cleanup_failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::MalformedDocument(_) => ErrorKind::MalformedDocument,
            ExtractionError::ParserFailure(_) => ErrorKind::ParserFailure,
            ExtractionError::ResourceCleanupFailure(_) => ErrorKind::ResourceCleanupFailure,
            ExtractionError::Cancelled => ErrorKind::Cancelled,
            ExtractionError::TimedOut(_) => ErrorKind::TimedOut,
        }
    }

    /// Generic message suitable for end users. Detail stays in `Display`.
    pub fn user_message(&self) -> &'static str {
        match self {
            ExtractionError::MalformedDocument(_) => {
                "The uploaded file does not appear to be a valid PDF."
            }
            ExtractionError::Cancelled | ExtractionError::TimedOut(_) => {
                "PDF conversion did not finish in time."
            }
            _ => "Failed to convert PDF.",
        }
    }
}
