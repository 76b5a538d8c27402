//! Error types for the bot API client.
//!
//! # Design
//! Failures fall into three families that callers branch on differently:
//! the request never completed (`Transport`, `Timeout`, `Cancelled`), the
//! server answered with a non-2xx status (`Api`, always carrying the numeric
//! status), or the server answered 2xx with a body that does not match the
//! expected type (`Decode`) or breaks the API contract
//! (`UnexpectedResponse`). The remaining variants are local failures that
//! happen before anything is sent.

use thiserror::Error;

/// Errors returned by `Client` and every resource facade.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection, DNS or socket failure before or during the exchange.
    #[error("transport error: {0}")]
    Transport(String),

    /// The context deadline or the configured timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The context's cancel token fired.
    #[error("request cancelled")]
    Cancelled,

    /// The server returned a non-2xx status.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A 2xx response body could not be deserialized into the expected type.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The request payload could not be serialized to JSON.
    #[error("failed to serialize request: {0}")]
    Serialization(#[source] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Missing or malformed client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A caller-supplied argument cannot form a valid request. Nothing was sent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A 2xx response that decoded but breaks the API contract.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status of an `Api` error, `None` for every other variant.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether repeating the same call could succeed.
    ///
    /// Transport failures and timeouts are retryable, as are 429 and 5xx
    /// responses. Nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Timeout => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> Error {
        Error::Api {
            status,
            code: "code".to_string(),
            message: "message".to_string(),
        }
    }

    #[test]
    fn status_is_exposed_only_for_api_errors() {
        assert_eq!(api(403).status(), Some(403));
        assert_eq!(Error::Timeout.status(), None);
        assert_eq!(Error::Transport("refused".to_string()).status(), None);
    }

    #[test]
    fn retryable_classification() {
        assert!(Error::Transport("reset".to_string()).is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(api(429).is_retryable());
        assert!(api(503).is_retryable());
        assert!(!api(404).is_retryable());
        assert!(!api(403).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::InvalidInput("..".to_string()).is_retryable());
        assert!(!Error::UnexpectedResponse("empty upload URL".to_string()).is_retryable());
    }

    #[test]
    fn api_error_display_includes_status_and_message() {
        let err = Error::Api {
            status: 403,
            code: "FORBIDDEN".to_string(),
            message: "no access".to_string(),
        };
        assert_eq!(err.to_string(), "API error 403 (FORBIDDEN): no access");
    }
}
