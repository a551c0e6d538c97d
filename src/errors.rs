/*!
 * Error types for the vntl application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
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

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider returned a different number of lines than it was sent
    #[error("Provider returned {actual} translations for {expected} inputs")]
    LengthMismatch {
        /// Number of texts submitted
        expected: usize,
        /// Number of texts returned
        actual: usize,
    },

    /// The call was abandoned because its run was cancelled
    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether repeating the same call may succeed.
    ///
    /// Structural failures (misaligned output, bad credentials) and
    /// cancellation are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ParseError(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => {
                *status_code == 408 || *status_code == 429 || *status_code >= 500
            }
            Self::AuthenticationError(_) | Self::LengthMismatch { .. } | Self::Cancelled => false,
        }
    }

    /// Map a non-success HTTP status and body to the matching error
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 | 403 => Self::AuthenticationError(message),
            429 => Self::RateLimitExceeded(message),
            _ => Self::ApiError { status_code, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that can occur while extracting dialogue from a source file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The format tag or file extension is not one we can parse
    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    /// The input claims a supported format but does not parse as one
    #[error("Malformed {format} input at line {line}: {message}")]
    Malformed {
        /// Format being parsed
        format: String,
        /// 1-based line of the problem
        line: usize,
        /// Description of the problem
        message: String,
    },
}

/// Errors that can occur while splicing translations back into a source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Item offsets do not fit the source text
    #[error("Item {item_id} range {start}..{end} is outside the source ({len} bytes)")]
    OutOfBounds {
        /// Offending item
        item_id: String,
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Source length
        len: usize,
    },

    /// Item offsets do not fall on UTF-8 character boundaries
    #[error("Item {0} range does not fall on character boundaries")]
    NotCharBoundary(String),

    /// Two items claim overlapping ranges
    #[error("Items {first} and {second} have overlapping ranges")]
    Overlap {
        /// Item with the lower start offset
        first: String,
        /// Item with the higher start offset
        second: String,
    },

    /// The translated text could not be encoded for the target literal
    #[error("Failed to encode translation for item {item_id}: {message}")]
    Encoding {
        /// Offending item
        item_id: String,
        /// Encoder message
        message: String,
    },
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error while reading or writing the store
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TranslationError {
    /// Whether this failure came from a misaligned provider response
    pub fn is_length_mismatch(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::LengthMismatch { .. }))
    }
}
