use std::time::Duration;

use cloudspend_core::error::CoreError;

/// Errors raised by a single connector call.
///
/// These never reach API callers: the aggregator and fleet scan log them
/// and drop the provider or resource they belong to.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("{provider} connector is not authenticated")]
    NotAuthenticated { provider: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    /// Transient or unclassified fault reported by the provider.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A billing API returned a non-2xx status code.
    #[error("Billing API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ConnectorError {
    /// Map an HTTP status from a billing API to the matching variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::Authentication(body),
            403 => Self::Permission(body),
            404 => Self::NotFound(body),
            _ => Self::Api { status, body },
        }
    }
}
