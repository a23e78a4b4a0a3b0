//! Core error types for `SiteGrab`.

use thiserror::Error;

/// Core error type for `SiteGrab` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A site or source was configured incorrectly.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data received from a backend.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unknown enum code (e.g. a persisted login status).
    #[error("Unknown {kind} code: {code}")]
    UnknownCode {
        /// Which enum the code was meant for.
        kind: &'static str,
        /// The offending value.
        code: u8,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
