// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `SiteGrab` Core
//!
//! Core types, models, and traits for the `SiteGrab` site access layer.
//!
//! This crate provides the foundational abstractions used across all other
//! `SiteGrab` crates, including:
//!
//! - Domain models (query types, login state, cookies, tags)
//! - Error types
//! - The tag database trait written to by tag sync
//!
//! ## Key Types
//!
//! ### Fetching
//! - [`QueryType`] - Why a fetch was issued
//! - [`Cookie`] - Cookie jar entry
//!
//! ### Login
//! - [`LoginStatus`] - Authentication state of a site
//! - [`LoginResult`] - Outcome reported with login notifications
//!
//! ### Backends
//! - [`ApiCapability`] / [`ApiCapabilities`] - What an API variant supports
//! - [`Tag`] / [`TagDatabase`] - Tag listing results and their sink

pub mod error;
pub mod models;
pub mod traits;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    ApiCapabilities, ApiCapability, Cookie, LoginResult, LoginStatus, QueryType, Tag,
    cookie_header,
};

// Re-export traits
pub use traits::TagDatabase;
