//! Per-site fetch plumbing.
//!
//! A [`FetchContext`] bundles the transport, the keychain and the fetch
//! settings. Each site gets its own; nothing here is process-wide.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatcher::{DispatchMode, Dispatcher};
use crate::error::FetchError;
use crate::host::{
    http::HttpTransport,
    keychain::{KeychainApi, SystemKeychain},
};
use crate::transport::Transport;

/// User agent string for SiteGrab.
pub const USER_AGENT: &str = concat!("SiteGrab/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Fetch Settings
// ============================================================================

/// Transport and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Timeout for a single request.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// User agent sent by the HTTP transport.
    pub user_agent: String,
    /// Domains the HTTP transport may contact, `None` for no restriction.
    pub allowed_domains: Option<Vec<String>>,
    /// How async fetch callbacks are tracked.
    pub dispatch_mode: DispatchMode,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: USER_AGENT.to_string(),
            allowed_domains: None,
            dispatch_mode: DispatchMode::Keyed,
        }
    }
}

impl FetchSettings {
    /// Replaces the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the dispatch mode.
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// What a site needs to talk to the outside world.
#[derive(Clone)]
pub struct FetchContext {
    /// Transport performing requests.
    pub transport: Arc<dyn Transport>,
    /// Credential lookup for login.
    pub keychain: Arc<dyn KeychainApi>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context with the HTTP transport and system keychain.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::builder().build()
    }

    /// Creates a context around an existing transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            keychain: Arc::new(SystemKeychain::new()),
            settings: FetchSettings::default(),
        }
    }

    /// Starts a builder.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Creates a dispatcher over this context's transport.
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::clone(&self.transport), self.settings.dispatch_mode)
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("transport", &self.transport.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for [`FetchContext`]; unset parts fall back to the system ones.
#[derive(Default)]
pub struct FetchContextBuilder {
    transport: Option<Arc<dyn Transport>>,
    keychain: Option<Arc<dyn KeychainApi>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the keychain.
    pub fn keychain(mut self, keychain: Arc<dyn KeychainApi>) -> Self {
        self.keychain = Some(keychain);
        self
    }

    /// Replaces all settings at once.
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the dispatch mode.
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.settings.dispatch_mode = mode;
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Finishes the context.
    ///
    /// Without an explicit transport an [`HttpTransport`] is built from
    /// the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP transport cannot be built.
    pub fn build(self) -> Result<FetchContext, FetchError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_settings(&self.settings)?),
        };

        Ok(FetchContext {
            transport,
            keychain: self.keychain.unwrap_or_else(|| Arc::new(SystemKeychain::new())),
            settings: self.settings,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
