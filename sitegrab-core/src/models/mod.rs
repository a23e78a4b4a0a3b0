//! Domain models for SiteGrab.
//!
//! ## Submodules
//!
//! - [`query`] - Fetch classification (`QueryType`)
//! - [`login`] - Login state machine types (`LoginStatus`, `LoginResult`)
//! - [`cookie`] - Cookie jar entries
//! - [`tag`] - Tags listed by a site
//! - [`api`] - API variant capability flags

mod api;
mod cookie;
mod login;
mod query;
mod tag;

pub use api::{ApiCapabilities, ApiCapability};
pub use cookie::{Cookie, cookie_header};
pub use login::{LoginResult, LoginStatus};
pub use query::QueryType;
pub use tag::Tag;
#[cfg(test)]
mod serde_tests;
