//! Host APIs for SiteGrab.
//!
//! This module provides the concrete collaborators a site talks to:
//!
//! - [`http`] - Production transport (reqwest) with domain allowlist
//! - [`mock`] - Scriptable in-memory transport
//! - [`keychain`] - Secure credential storage (system keychain)

pub mod http;
pub mod keychain;
pub mod mock;

// Re-export key types
pub use http::HttpTransport;
pub use keychain::{KeychainApi, MemoryKeychain, SystemKeychain};
pub use mock::MockTransport;
