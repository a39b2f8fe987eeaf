//! Huginn error types

use std::fmt;
use std::time::Duration;

/// Huginn error types
#[derive(Debug, thiserror::Error)]
pub enum HuginnError {
    // Backend/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode backend response: {0}")]
    Decode(String),

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    /// Model output does not fit the configured label set or token encoding.
    ///
    /// Never surfaced to callers by the decoder itself; it degrades to an
    /// empty prediction and this variant only travels as far as the log line.
    #[error("decode degraded: {0}")]
    DecodeDegraded(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // External collaborators (object store, webhook, job dispatch)
    #[error("side effect failed: {0}")]
    Sink(String),
}

/// Failure modes of document text extraction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// Extraction is not enabled in configuration; no network call was made.
    #[error("extraction backend is disabled")]
    Disabled,

    #[error("document payload is empty")]
    EmptyDocument,

    /// Transport, status or decode failure talking to the extraction model.
    #[error("extraction backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but the document yielded no text.
    #[error("extraction returned no text")]
    NoText,
}

/// Externally visible classification of every error in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BackendDisabled,
    BackendUnavailable,
    NoTextExtracted,
    InvalidInput,
    DecodeDegraded,
    Internal,
}

impl ErrorCode {
    /// Stable wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendDisabled => "backend_disabled",
            Self::BackendUnavailable => "backend_unavailable",
            Self::NoTextExtracted => "no_text_extracted",
            Self::InvalidInput => "invalid_input",
            Self::DecodeDegraded => "decode_degraded",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ExtractionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Disabled => ErrorCode::BackendDisabled,
            Self::EmptyDocument => ErrorCode::InvalidInput,
            Self::Unavailable(_) => ErrorCode::BackendUnavailable,
            Self::NoText => ErrorCode::NoTextExtracted,
        }
    }
}

impl HuginnError {
    /// Classify this error for callers.
    ///
    /// Every transport-level failure collapses into `BackendUnavailable`:
    /// the caller only needs to know whether to try again later.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::Api { .. } | Self::Decode(_) => {
                ErrorCode::BackendUnavailable
            }
            Self::InvalidInput(_) | Self::Json(_) => ErrorCode::InvalidInput,
            Self::DecodeDegraded(_) => ErrorCode::DecodeDegraded,
            Self::Extraction(e) => e.code(),
            Self::Tokenization(_) | Self::Configuration(_) | Self::Sink(_) => ErrorCode::Internal,
        }
    }

    /// Map a reqwest transport error, keeping timeouts distinguishable in logs.
    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            HuginnError::Timeout(timeout)
        } else {
            HuginnError::Http(err.to_string())
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;
