//! HTTP transport with tracing and domain allowlist.
//!
//! This module provides the production [`Transport`], wrapping a reqwest
//! client with:
//! - Request/response tracing
//! - Domain allowlist for security
//! - Timeout and user agent taken from [`FetchSettings`]

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::context::FetchSettings;
use crate::error::FetchError;
use crate::request::SiteRequest;
use crate::transport::{SiteResponse, Transport};

// ============================================================================
// HTTP Transport
// ============================================================================

/// Transport backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
    timeout: Duration,
    allowed_domains: Option<Vec<String>>,
}

impl HttpTransport {
    /// Creates a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, FetchError> {
        Self::from_settings(&FetchSettings::default())
    }

    /// Creates a transport from fetch settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()?;

        Ok(Self {
            inner: client,
            timeout: settings.timeout,
            allowed_domains: settings.allowed_domains.clone(),
        })
    }

    /// Restricts requests to the given domains and their subdomains.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &Url) -> Result<(), FetchError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(()); // No restrictions
        };

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(FetchError::DomainNotAllowed(host.to_string()))
        }
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout.as_secs())
        } else if err.is_connect() {
            FetchError::Connection(err.to_string())
        } else {
            FetchError::Http(err)
        }
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn perform(&self, request: &SiteRequest) -> SiteResponse {
        if let Err(e) = self.is_domain_allowed(&request.url) {
            warn!(error = %e, "Refusing request");
            return SiteResponse::failed(request.url.clone(), e);
        }

        debug!("GET request");
        let response = match self
            .inner
            .get(request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Request failed");
                return SiteResponse::failed(request.url.clone(), self.map_error(e));
            }
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect();
        debug!(status, "Response received");

        match response.bytes().await {
            Ok(body) => SiteResponse {
                url: request.url.clone(),
                status: Some(status),
                headers,
                body: body.to_vec(),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Failed to read response body");
                SiteResponse {
                    url: request.url.clone(),
                    status: Some(status),
                    headers,
                    body: Vec::new(),
                    error: Some(self.map_error(e)),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
