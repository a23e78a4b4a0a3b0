//! The transport seam and the response it produces.

use async_trait::async_trait;
use std::borrow::Cow;
use url::Url;

use crate::error::FetchError;
use crate::request::SiteRequest;

// ============================================================================
// Site Response
// ============================================================================

/// Raw outcome of a transport call.
///
/// A failed call still produces a response: `error` is set and `status`
/// may be missing. Nothing in this crate interprets the failure further.
#[derive(Debug)]
pub struct SiteResponse {
    /// URL that was requested.
    pub url: Url,
    /// HTTP status code, when the server answered.
    pub status: Option<u16>,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
    /// Transport-level failure, passed through untouched.
    pub error: Option<FetchError>,
}

impl SiteResponse {
    /// Creates a response for a request the server answered.
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            status: Some(status),
            headers: Vec::new(),
            body: body.into(),
            error: None,
        }
    }

    /// Creates a response for a request that never got an answer.
    pub fn failed(url: Url, error: FetchError) -> Self {
        Self {
            url,
            status: None,
            headers: Vec::new(),
            body: Vec::new(),
            error: Some(error),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for a 2xx answer with no transport error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| (200..300).contains(&s))
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Performs requests. Connection pooling, TLS and proxies live behind it.
///
/// Implementations never return an error directly: failures are reported
/// through [`SiteResponse::error`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Performs the request and waits for the full response.
    async fn perform(&self, request: &SiteRequest) -> SiteResponse;
}
