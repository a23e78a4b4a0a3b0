//! Request building: URL normalization and header injection.
//!
//! A [`RequestBuilder`] is bound to one site's base URL. It turns whatever a
//! backend hands back (relative paths, protocol-relative links, absolute
//! URLs) into an absolute `http`/`https` URL, then composes a
//! [`SiteRequest`] carrying the site's cookies and an optional referer.
//! Nothing here performs I/O.

use chrono::Utc;
use reqwest::header::{self, HeaderMap, HeaderValue};
use sitegrab_core::{Cookie, QueryType, cookie_header};
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;

// ============================================================================
// Request Context
// ============================================================================

/// Bookkeeping attached to a request for downstream consumers.
///
/// Page and image identifiers are not interpreted here; they only ride
/// along so completion handlers know what a response belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Referer header to send.
    pub referer: Option<String>,
    /// Listing page this request was issued for.
    pub page: Option<String>,
    /// Image this request was issued for.
    pub image: Option<String>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the referer.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Associates the request with a listing page.
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    /// Associates the request with an image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

// ============================================================================
// Site Request
// ============================================================================

/// A transport-ready request descriptor.
#[derive(Debug, Clone)]
pub struct SiteRequest {
    /// Absolute URL to fetch.
    pub url: Url,
    /// Headers to send (cookie, referer).
    pub headers: HeaderMap,
    /// Caller bookkeeping.
    pub context: RequestContext,
    /// Set by the dispatcher when the request is issued asynchronously.
    pub query_type: Option<QueryType>,
}

impl SiteRequest {
    /// Creates a bare request with no headers.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
            context: RequestContext::default(),
            query_type: None,
        }
    }

    /// Returns the `Cookie` header, if any.
    pub fn cookie_header(&self) -> Option<&str> {
        self.headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the `Referer` header, if any.
    pub fn referer(&self) -> Option<&str> {
        self.headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
    }
}

// ============================================================================
// Request Builder
// ============================================================================

/// Builds normalized requests for a single site.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base: Url,
    ssl: bool,
}

impl RequestBuilder {
    /// Creates a builder for the given base URL.
    ///
    /// A base without a scheme (`example.com`) gets `https` when `ssl` is
    /// set and `http` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] if the base cannot be parsed and
    /// [`FetchError::UnsupportedScheme`] for non-HTTP bases.
    pub fn new(base: &str, ssl: bool) -> Result<Self, FetchError> {
        let base = base.trim();
        let raw = if base.contains("://") {
            base.to_string()
        } else {
            format!("{}://{}", if ssl { "https" } else { "http" }, base)
        };

        let mut base = Url::parse(&raw)?;
        check_scheme(&base)?;
        if base.host_str().is_none() {
            return Err(FetchError::InvalidUrl(format!("no host in {raw}")));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base, ssl })
    }

    /// Returns the normalized base URL.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Returns true if same-host `http` URLs are upgraded to `https`.
    pub fn ssl(&self) -> bool {
        self.ssl
    }

    /// Resolves a URL against the site's base.
    ///
    /// The result is always absolute, and feeding it back in returns it
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, unparsable URLs, and schemes
    /// other than `http`/`https`.
    pub fn fix_url(&self, raw: &str) -> Result<Url, FetchError> {
        self.resolve(raw, &self.base)
    }

    /// Resolves a URL against a previously fetched URL instead of the base.
    ///
    /// Used for "next page" links, which are relative to the page they
    /// appear on.
    ///
    /// # Errors
    ///
    /// Same as [`RequestBuilder::fix_url`].
    pub fn fix_url_from(&self, raw: &str, previous: &Url) -> Result<Url, FetchError> {
        self.resolve(raw, previous)
    }

    fn resolve(&self, raw: &str, against: &Url) -> Result<Url, FetchError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(FetchError::InvalidUrl("empty URL".to_string()));
        }

        let mut url = match raw.strip_prefix("//") {
            Some(rest) => Url::parse(&format!("{}://{}", self.base.scheme(), rest))?,
            None => against.join(raw)?,
        };
        check_scheme(&url)?;

        if self.ssl && url.scheme() == "http" && url.host_str() == self.base.host_str() {
            // http -> https is always a valid scheme change
            let _ = url.set_scheme("https");
        }

        Ok(url)
    }

    /// Composes a request for `url`.
    ///
    /// Cookies are filtered by host, path, `secure` flag and expiry before
    /// being joined into the `Cookie` header. Cookies without a domain
    /// belong to the base host only. The jar is only read.
    pub fn make_request(&self, url: Url, context: RequestContext, cookies: &[Cookie]) -> SiteRequest {
        let mut headers = HeaderMap::new();

        let site_host = self.base.host_str().unwrap_or_default();
        let host = url.host_str().unwrap_or_default();
        let is_https = url.scheme() == "https";
        let now = Utc::now();
        let matching = cookies
            .iter()
            .filter(|c| c.matches(site_host, host, url.path(), is_https, now));

        if let Some(value) = cookie_header(matching) {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(header::COOKIE, value);
                }
                Err(e) => warn!(url = %url, error = %e, "Dropping malformed cookie header"),
            }
        }

        if let Some(referer) = context.referer.as_deref().filter(|r| !r.is_empty()) {
            match HeaderValue::from_str(referer) {
                Ok(value) => {
                    headers.insert(header::REFERER, value);
                }
                Err(e) => warn!(url = %url, error = %e, "Dropping malformed referer"),
            }
        }

        debug!(url = %url, headers = headers.len(), "Built request");

        SiteRequest {
            url,
            headers,
            context,
            query_type: None,
        }
    }
}

fn check_scheme(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::UnsupportedScheme(other.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
