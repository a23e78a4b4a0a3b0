// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # SiteGrab Fetch
//!
//! Request building, transports and async fetch dispatch for SiteGrab.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::http`] - HTTP transport with tracing and domain allowlist
//! - [`host::keychain`] - Secure credential storage (system keychain)
//! - [`host::mock`] - Scriptable transport for tests
//!
//! ## Fetching
//!
//! - [`request::RequestBuilder`] - Normalizes URLs against a site base
//! - [`dispatcher::Dispatcher`] - Runs fetches and routes completions
//! - [`retry::RetryPolicy`] - Classifies responses for retry
//! - [`context::FetchContext`] - Bundles transport, keychain and settings
//!
//! ## Example
//!
//! ```ignore
//! use sitegrab_fetch::{FetchContext, RequestBuilder, RequestContext};
//! use sitegrab_core::QueryType;
//!
//! let ctx = FetchContext::new()?;
//! let dispatcher = ctx.dispatcher();
//! let builder = RequestBuilder::new("danbooru.donmai.us", true)?;
//!
//! let url = builder.fix_url("/tags.json?page=1")?;
//! let request = builder.make_request(url, RequestContext::new(), &[]);
//! dispatcher.get_async(QueryType::List, request, |response| {
//!     println!("{}", response.text());
//! });
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod request;
pub mod retry;
pub mod transport;

// Errors
pub use error::{FetchError, KeychainError};

// Host APIs
pub use host::{
    http::HttpTransport,
    keychain::{KeychainApi, MemoryKeychain, SystemKeychain},
    mock::MockTransport,
};

// Context
pub use context::{FetchContext, FetchContextBuilder, FetchSettings, USER_AGENT};

// Requests and dispatch
pub use dispatcher::{DispatchMode, Dispatcher, FetchCallback, FetchHandle, FinishedObserver, RequestId};
pub use request::{RequestBuilder, RequestContext, SiteRequest};
pub use retry::{RetryClass, RetryPolicy};
pub use transport::{SiteResponse, Transport};
