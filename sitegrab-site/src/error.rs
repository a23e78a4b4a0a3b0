//! Site error types.

use sitegrab_fetch::FetchError;
use sitegrab_store::StoreError;
use thiserror::Error;

/// Errors raised while building or driving a site.
#[derive(Debug, Error)]
pub enum SiteError {
    /// URL or transport setup failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Settings could not be read or written.
    #[error("Settings error: {0}")]
    Store(#[from] StoreError),

    /// The site configuration is unusable.
    #[error("Invalid site configuration: {0}")]
    InvalidConfig(String),
}
