/*
[INPUT]:  Error sources (HTTP, API, serialization, signing, clock sync)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Main error type for the spot connector
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error (code {code}): {message}")]
    Api { code: i32, message: String },

    /// Authentication failed or credentials are missing
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Signing was attempted before the server time offset was ever measured
    #[error("server time offset sync not yet done")]
    UnsyncedClock,

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    /// Connection timeout
    #[error("Connection timeout after {duration}s")]
    Timeout { duration: u64 },
}

/// Error payload returned by the exchange, e.g. `{"code":-1021,"msg":"..."}`
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i32,
    msg: String,
}

impl ConnectorError {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConnectorError::Http(_)
                | ConnectorError::RateLimit { .. }
                | ConnectorError::Timeout { .. }
                | ConnectorError::InvalidResponse(_)
        )
    }

    /// Get retry delay in seconds (if retryable)
    pub fn retry_delay(&self) -> Option<u64> {
        match self {
            ConnectorError::RateLimit { retry_after } => Some(*retry_after),
            ConnectorError::Timeout { .. } => Some(1),
            _ => None,
        }
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ConnectorError::Authentication { .. } | ConnectorError::UnsyncedClock
        )
    }

    /// Create an API error from status code and response body.
    ///
    /// Uses the exchange's own `code`/`msg` when the body carries them and
    /// falls back to the HTTP status otherwise.
    pub fn api_error(status: StatusCode, body: impl Into<String>) -> Self {
        let body = body.into();
        match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => ConnectorError::Api {
                code: parsed.code,
                message: parsed.msg,
            },
            Err(_) => ConnectorError::Api {
                code: status.as_u16() as i32,
                message: body,
            },
        }
    }
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, ConnectorError>;
