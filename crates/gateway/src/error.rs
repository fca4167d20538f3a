//! Gateway error types.

use thiserror::Error;

/// Errors that can occur talking to the venue.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP error with status code and body.
    #[error("HTTP error: {status} - {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// Request timed out.
    #[error("request timeout")]
    Timeout,

    /// Connection error (network issue).
    #[error("connection error: {0}")]
    Connection(String),

    /// Response body did not match the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Rate limited by the venue.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before retrying.
        retry_after_ms: u64,
    },

    /// Failed to build the HTTP client or request.
    #[error("request build error: {0}")]
    RequestBuild(String),
}

impl GatewayError {
    /// Whether the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connection(_) | Self::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::Timeout.is_retryable());
        assert!(GatewayError::Connection("reset".into()).is_retryable());
        assert!(GatewayError::RateLimited { retry_after_ms: 1000 }.is_retryable());

        assert!(!GatewayError::Parse("bad".into()).is_retryable());
        assert!(!GatewayError::Http {
            status: 500,
            message: "oops".into()
        }
        .is_retryable());
    }
}
