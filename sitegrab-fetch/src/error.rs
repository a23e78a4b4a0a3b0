//! Fetch error types.

use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
///
/// Transport failures travel inside [`crate::SiteResponse::error`] rather
/// than being returned, so callers see them exactly as the transport
/// reported them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// URL could not be parsed or resolved.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL uses a scheme the transports cannot fetch.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// The fetch task was cancelled before the transport answered.
    #[error("Request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true for failures that may go away on a second attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Timeout(_) | Self::Connection(_) => true,
            _ => false,
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}

// ============================================================================
// Keychain Error
// ============================================================================

/// Error type for keychain operations.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Access denied.
    #[error("Access denied to keychain")]
    AccessDenied,

    /// Platform error.
    #[error("Platform error: {0}")]
    Platform(String),

    /// Generic error.
    #[error("Keychain error: {0}")]
    Other(String),
}

impl From<keyring::Error> for KeychainError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(e) => KeychainError::Platform(e.to_string()),
            keyring::Error::NoStorageAccess(_) => KeychainError::AccessDenied,
            _ => KeychainError::Other(err.to_string()),
        }
    }
}
