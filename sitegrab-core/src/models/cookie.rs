//! Session cookies held in a site's cookie jar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single HTTP cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Domain the cookie is scoped to. Empty means the owning site's host.
    #[serde(default)]
    pub domain: String,
    /// Path prefix the cookie applies to.
    #[serde(default = "default_path")]
    pub path: String,
    /// Expiry, `None` for session cookies.
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
    /// Only sent over HTTPS.
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    /// Creates a session cookie scoped to the owning site.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: default_path(),
            expires: None,
            secure: false,
        }
    }

    /// Sets the domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the expiry time.
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Marks the cookie as HTTPS-only.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Returns true if the cookie has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|exp| exp <= now)
    }

    /// Returns true if this cookie should be sent for the given request.
    ///
    /// A cookie without a domain is host-only: it matches `site_host`
    /// exactly and no other host, subdomains included.
    pub fn matches(
        &self,
        site_host: &str,
        host: &str,
        path: &str,
        is_https: bool,
        now: DateTime<Utc>,
    ) -> bool {
        if self.secure && !is_https {
            return false;
        }
        if self.is_expired_at(now) {
            return false;
        }
        self.matches_domain(site_host, host) && self.matches_path(path)
    }

    fn matches_domain(&self, site_host: &str, host: &str) -> bool {
        let domain = self.domain.trim_start_matches('.');
        if domain.is_empty() {
            return !site_host.is_empty() && host.eq_ignore_ascii_case(site_host);
        }
        host.eq_ignore_ascii_case(domain)
            || host
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
    }

    fn matches_path(&self, path: &str) -> bool {
        if self.path.is_empty() || self.path == "/" {
            return true;
        }
        path == self.path
            || (path.starts_with(&self.path)
                && (self.path.ends_with('/') || path[self.path.len()..].starts_with('/')))
    }

    /// Returns the `name=value` pair.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Joins cookies into a `Cookie` header value. Returns `None` when empty.
pub fn cookie_header<'a, I>(cookies: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Cookie>,
{
    let header = cookies
        .into_iter()
        .map(Cookie::pair)
        .collect::<Vec<_>>()
        .join("; ");
    if header.is_empty() { None } else { Some(header) }
}
