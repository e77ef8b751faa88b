//! Error types for the feed client.
//!
//! A single `FeedError` covers both the data plane (stream, snapshots)
//! and the execution plane (order submission). Errors self-classify so a
//! supervisor can make retry decisions; the core itself never retries.

use std::time::Duration;
use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Taxonomy code attached to every authorization failure.
pub const AUTHORIZATION_FAILED: i32 = 2001;

/// Errors that can occur during feed operations.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum FeedError {
    /// Invalid configuration (empty markets, unknown k-line period, bad URL)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection error (WebSocket, TCP)
    #[error("Connection error: {0}")]
    Connection(String),

    /// WebSocket stream error after a connection was established
    #[error("Stream error: {0}")]
    Stream(String),

    /// HTTP transport error (request never produced a status)
    #[error("Request error: {0}")]
    Request(String),

    /// Upstream HTTP failure (status >= 300)
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Authentication failure, surfaced with taxonomy code 2001
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// Failed to parse a response or frame
    #[error("Parse error: {0}")]
    Parse(String),

    /// Venue error with its own code and message
    #[error("Venue error [{code}]: {message}")]
    VenueSpecific {
        /// Venue error code
        code: i32,
        /// Venue error message
        message: String,
    },

    /// Operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The engine or trader was stopped while the operation was in flight
    #[error("Closed")]
    Closed,
}

/// Classification of error types for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// May resolve on retry (network issues, timeouts)
    Transient,
    /// Won't resolve on retry (invalid input, parse failures)
    Permanent,
    /// Missing or invalid configuration
    Configuration,
}

impl FeedError {
    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FeedError::Configuration(_) => ErrorCategory::Configuration,
            FeedError::Connection(_) | FeedError::Stream(_) | FeedError::Request(_) => {
                ErrorCategory::Transient
            }
            FeedError::Status { status, .. } => {
                if *status >= 500 {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            FeedError::Authorization(_) => ErrorCategory::Configuration,
            FeedError::Parse(_) => ErrorCategory::Permanent,
            FeedError::VenueSpecific { code, .. } => match code {
                -1003 | -1015 => ErrorCategory::Transient,
                -1021 | -1022 => ErrorCategory::Transient,
                _ => ErrorCategory::Permanent,
            },
            FeedError::Timeout(_) => ErrorCategory::Transient,
            FeedError::Closed => ErrorCategory::Permanent,
        }
    }

    /// Returns true if this error may succeed on retry.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    /// Returns true if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, FeedError::Authorization(_))
    }

    /// Returns the taxonomy or venue code attached to this error.
    pub fn code(&self) -> Option<i32> {
        match self {
            FeedError::Authorization(_) => Some(AUTHORIZATION_FAILED),
            FeedError::VenueSpecific { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Suggests a delay before retrying, if applicable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            FeedError::Connection(_) | FeedError::Stream(_) => Some(Duration::from_secs(1)),
            FeedError::Request(_) => Some(Duration::from_millis(100)),
            FeedError::Timeout(_) => Some(Duration::from_millis(500)),
            FeedError::Status { status, .. } if *status >= 500 => Some(Duration::from_secs(1)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = FeedError::Connection("refused".to_string());
        assert!(err.is_transient());
        assert!(err.suggested_retry_delay().is_some());

        let err = FeedError::Parse("bad json".to_string());
        assert!(!err.is_transient());
        assert_eq!(err.category(), ErrorCategory::Permanent);

        let err = FeedError::Configuration("no markets".to_string());
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_authorization_code() {
        let err = FeedError::Authorization("bad signature".to_string());
        assert!(err.is_auth_error());
        assert_eq!(err.code(), Some(2001));
    }

    #[test]
    fn test_status_classification() {
        let err = FeedError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.is_transient());

        let err = FeedError::Status {
            status: 400,
            body: "bad request".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_venue_code_passthrough() {
        let err = FeedError::VenueSpecific {
            code: -1121,
            message: "Invalid symbol".to_string(),
        };
        assert_eq!(err.code(), Some(-1121));
        assert!(!err.is_transient());
    }
}
