//! Error types for the providers module

use thiserror::Error;

use crate::context::CancelReason;

/// Errors that can occur when interacting with providers
#[derive(Debug, Error, PartialEq, Clone)]
pub enum ProviderError {
    /// A request could not even be constructed (bad URL, bad header, unencodable payload)
    #[error("Setup error: {0}")]
    Setup(String),

    /// The backend failed: non-success status or network-level failure
    #[error("{}", format_remote(*.status, .message))]
    Remote {
        /// HTTP status code, when the backend answered at all
        status: Option<u16>,
        /// Human-readable failure reason
        message: String,
    },

    /// The backend answered successfully but the body had an unexpected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// The shared probe context was cancelled or its deadline passed
    #[error("Request cancelled: {0}")]
    Cancelled(CancelReason),

    /// Provider not found by name
    #[error("Provider not found: {0}")]
    NotFound(String),

    /// Credential could not be routed into the request (never includes the credential)
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Invalid model specified
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn format_remote(status: Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Remote error (HTTP {}): {}", code, message),
        None => format!("Remote error: {}", message),
    }
}

impl ProviderError {
    /// Build a remote error carrying an HTTP status code
    pub fn remote_status(status: u16, message: impl Into<String>) -> Self {
        ProviderError::Remote {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build a remote error for a network-level failure with no status code
    pub fn remote(message: impl Into<String>) -> Self {
        ProviderError::Remote {
            status: None,
            message: message.into(),
        }
    }

    /// Whether the backend itself reported or caused the failure
    pub fn is_remote(&self) -> bool {
        matches!(self, ProviderError::Remote { .. })
    }

    /// The HTTP status code attached to a remote error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Remote { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Decode(err.to_string())
    }
}

impl From<serde_yaml::Error> for ProviderError {
    fn from(err: serde_yaml::Error) -> Self {
        ProviderError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ProviderError::Setup(err.to_string())
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else if err.is_timeout() {
            ProviderError::remote("Request timeout")
        } else {
            ProviderError::Remote {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_includes_status() {
        let err = ProviderError::remote_status(500, "internal server error");
        assert_eq!(
            err.to_string(),
            "Remote error (HTTP 500): internal server error"
        );
        assert_eq!(err.status_code(), Some(500));
        assert!(err.is_remote());
    }

    #[test]
    fn test_remote_error_without_status() {
        let err = ProviderError::remote("connection refused");
        assert_eq!(err.to_string(), "Remote error: connection refused");
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_cancelled_error_display() {
        let err = ProviderError::Cancelled(CancelReason::DeadlineExceeded);
        assert_eq!(
            err.to_string(),
            "Request cancelled: context deadline exceeded"
        );
        assert!(!err.is_remote());
    }

    #[test]
    fn test_json_errors_become_decode_errors() {
        let err: ProviderError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
