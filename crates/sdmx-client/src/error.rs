//! Errors raised while talking to the remote service.

use sdmx_model::EngineError;
use thiserror::Error;

/// Failure of a single remote call. Every variant carries the offending URL.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Connection, timeout or TLS failure.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Non-success HTTP status.
    #[error("HTTP {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// Resource does not exist (HTTP 404 or an empty structure message).
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Response body was not the expected JSON.
    #[error("invalid JSON from {url}: {message}")]
    Json { url: String, message: String },

    /// Response body was not well-formed SDMX-ML.
    #[error("invalid XML from {url}: {message}")]
    Xml { url: String, message: String },

    /// Local configuration could not be read.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Network { url, .. }
            | Self::Status { url, .. }
            | Self::NotFound { url }
            | Self::Json { url, .. }
            | Self::Xml { url, .. } => Some(url),
            Self::Config(_) => None,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        let retryable = err.is_retryable();
        let url = err.url().unwrap_or_default().to_string();
        EngineError::Remote {
            url,
            message: err.to_string(),
            retryable,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        let err = ClientError::Status {
            url: "u".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_retryable());
        let err = ClientError::Status {
            url: "u".to_string(),
            status: 400,
            message: "bad".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!ClientError::NotFound { url: "u".to_string() }.is_retryable());
    }

    #[test]
    fn converts_into_remote_engine_error() {
        let err: EngineError = ClientError::Network {
            url: "https://example.org/x".to_string(),
            message: "timed out".to_string(),
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.url(), Some("https://example.org/x"));
    }
}
