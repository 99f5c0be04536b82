//! Error types for the provider runtime

use thiserror::Error;

/// Errors surfaced by providers and the router facade
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// Provider is not connected or its backend is missing
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Handshake or authentication failed during connect
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Requested model id is unknown to the provider
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Transport or backend error during a request
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Malformed request options, caught before dispatch
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ProviderError::ConnectionFailed(err.to_string())
        } else if err.is_timeout() {
            ProviderError::RequestFailed("request timed out".to_string())
        } else {
            ProviderError::RequestFailed(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::RequestFailed(format!("malformed backend response: {err}"))
    }
}
