/*!
 * Error types for the folio pipeline.
 *
 * Each stage has its own error enum derived with thiserror. Every error maps
 * onto an [`ErrorCategory`], which is what a job exposes to status pollers.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error categories surfaced on jobs and warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The source document could not be parsed
    CorruptInput,
    /// The source document uses a feature we refuse to process (encryption)
    Unsupported,
    /// A retryable failure of the external translator
    TranslationTransient,
    /// A batch ran out of attempts and fell back to source text
    TranslationExhausted,
    /// Too many units fell back to source text
    JobFailureThresholdExceeded,
    /// Translated text did not fit its box and was truncated
    RenderOverflow,
    /// Output could not be rendered at all
    RenderError,
    /// The job was cancelled by the caller
    Cancelled,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CorruptInput => "CorruptInput",
            Self::Unsupported => "Unsupported",
            Self::TranslationTransient => "TranslationTransient",
            Self::TranslationExhausted => "TranslationExhausted",
            Self::JobFailureThresholdExceeded => "JobFailureThresholdExceeded",
            Self::RenderOverflow => "RenderOverflow",
            Self::RenderError => "RenderError",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The model answered, but not with one translation per input text
    #[error("Malformed translation response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_)
            | Self::ConnectionError(_)
            | Self::Timeout(_)
            | Self::RequestFailed(_)
            | Self::ParseError(_)
            | Self::MalformedResponse(_) => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::AuthenticationError(_) => false,
        }
    }

    /// Build an error from an HTTP status and body, classifying the common codes
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            408 | 504 => Self::Timeout(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors raised while building the content model
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The bytes are not a readable document
    #[error("Corrupt input: {0}")]
    CorruptInput(String),

    /// The document is readable but uses an unsupported feature
    #[error("Unsupported document: {0}")]
    Unsupported(String),
}

impl ExtractError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CorruptInput(_) => ErrorCategory::CorruptInput,
            Self::Unsupported(_) => ErrorCategory::Unsupported,
        }
    }
}

impl From<lopdf::Error> for ExtractError {
    fn from(error: lopdf::Error) -> Self {
        let message = error.to_string();
        let lowered = message.to_lowercase();
        if lowered.contains("encrypt") || lowered.contains("decrypt") || lowered.contains("password") {
            Self::Unsupported(message)
        } else {
            Self::CorruptInput(message)
        }
    }
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Too many units fell back to their source text
    #[error("{failed} of {total} units failed to translate (ceiling {pct:.0}%)", pct = .ceiling * 100.0)]
    ThresholdExceeded {
        failed: usize,
        total: usize,
        ceiling: f64,
    },

    /// Cancellation was observed at a batch boundary
    #[error("Translation cancelled")]
    Cancelled,
}

impl TranslationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Provider(e) if e.is_transient() => ErrorCategory::TranslationTransient,
            Self::Provider(_) => ErrorCategory::TranslationExhausted,
            Self::ThresholdExceeded { .. } => ErrorCategory::JobFailureThresholdExceeded,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }
}

/// Errors raised while writing the output document
#[derive(Error, Debug)]
pub enum RenderError {
    /// The rendering font is unusable
    #[error("Font error: {0}")]
    Font(String),

    /// The output document could not be assembled or serialized
    #[error("Output error: {0}")]
    Output(String),

    /// The translated units do not line up with the document
    #[error("Layout error: {0}")]
    Layout(String),

    /// Cancellation was observed between pages
    #[error("Reconstruction cancelled")]
    Cancelled,
}

impl RenderError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Cancelled => ErrorCategory::Cancelled,
            _ => ErrorCategory::RenderError,
        }
    }
}

impl From<lopdf::Error> for RenderError {
    fn from(error: lopdf::Error) -> Self {
        Self::Output(error.to_string())
    }
}

/// Reasons a job ends in the Failed state
#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Job cancelled")]
    Cancelled,

    /// A worker task died before reporting an outcome
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Extract(e) => e.category(),
            Self::Translation(e) => e.category(),
            Self::Render(e) => e.category(),
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal(_) => ErrorCategory::RenderError,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A job ended in failure
    #[error("Job failed: {0}")]
    Job(#[from] JobError),

    /// The referenced job is unknown or already purged
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_withCommonCodes_shouldClassify() {
        assert!(matches!(ProviderError::from_status(401, "no"), ProviderError::AuthenticationError(_)));
        assert!(matches!(ProviderError::from_status(429, "slow down"), ProviderError::RateLimitExceeded(_)));
        assert!(matches!(ProviderError::from_status(504, "gateway"), ProviderError::Timeout(_)));
        assert!(matches!(ProviderError::from_status(500, "boom"), ProviderError::ApiError { status_code: 500, .. }));
    }

    #[test]
    fn test_is_transient_withClientErrors_shouldNotRetry() {
        assert!(!ProviderError::AuthenticationError("bad key".into()).is_transient());
        assert!(!ProviderError::ApiError { status_code: 400, message: "bad".into() }.is_transient());
        assert!(ProviderError::ApiError { status_code: 503, message: "busy".into() }.is_transient());
        assert!(ProviderError::MalformedResponse("2 of 3".into()).is_transient());
    }

    #[test]
    fn test_job_error_category_shouldFollowInnerError() {
        let err = JobError::from(TranslationError::ThresholdExceeded { failed: 10, total: 10, ceiling: 0.2 });
        assert_eq!(err.category(), ErrorCategory::JobFailureThresholdExceeded);
        assert_eq!(JobError::from(ExtractError::Unsupported("encrypted".into())).category(), ErrorCategory::Unsupported);
        assert_eq!(JobError::from(RenderError::Cancelled).category(), ErrorCategory::Cancelled);
    }
}
