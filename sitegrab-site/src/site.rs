//! The site aggregate.
//!
//! A [`Site`] is one configured remote source. It owns its API variants,
//! its login capability and its cookie jar, and shares settings and the
//! tag database with the rest of the application. `Site` is a cheap handle:
//! clones share state, which lets spawned login and fetch completions
//! update the site they came from.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sitegrab_core::{ApiCapability, Cookie, LoginResult, LoginStatus, QueryType, TagDatabase};
use sitegrab_fetch::{
    Dispatcher, FetchContext, FetchError, FetchHandle, KeychainApi, RequestBuilder, RequestContext,
    RequestId, SiteRequest, SiteResponse,
};
use sitegrab_store::{InMemoryTagDatabase, MixedSettings};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use crate::api::ApiVariant;
use crate::error::SiteError;
use crate::events::{EVENT_CAPACITY, SiteEvent};
use crate::login::{Credentials, LoginCapability, LoginCoordinator, LoginError, LoginSession, LoginTrigger};
use crate::registry::ApiRegistry;

/// Settings keys read by a site.
pub mod keys {
    /// Prefer https (bool, default true).
    pub const SSL: &str = "ssl";
    /// Configured cookies (`Vec<Cookie>`).
    pub const COOKIES: &str = "cookies";
    /// Log in automatically when needed (bool, default true).
    pub const AUTO_LOGIN: &str = "login/auto_login";
    /// Prefix of credential fields, as in `auth/password`.
    pub const AUTH_PREFIX: &str = "auth/";
}

// ============================================================================
// Site Config
// ============================================================================

/// Static description of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Source type the site belongs to (e.g. `Danbooru`).
    #[serde(rename = "type")]
    pub site_type: String,
    /// Display name, usually the host.
    pub name: String,
    /// Base URL, with or without scheme.
    pub url: String,
    /// Whether queries need an authenticated session.
    #[serde(default)]
    pub requires_login: bool,
    /// Free-form source information.
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

impl SiteConfig {
    /// Creates a config named after its URL.
    pub fn new(site_type: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            site_type: site_type.into(),
            name: url.clone(),
            url,
            requires_login: false,
            info: BTreeMap::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Marks the site as requiring authentication.
    pub fn requiring_login(mut self) -> Self {
        self.requires_login = true;
        self
    }

    /// Adds a source information entry.
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Site
// ============================================================================

struct SiteInner {
    config: SiteConfig,
    requests: RwLock<RequestBuilder>,
    apis: ApiRegistry,
    login: Mutex<LoginCoordinator>,
    cookies: RwLock<Vec<Cookie>>,
    settings: MixedSettings,
    tag_database: Arc<dyn TagDatabase>,
    keychain: Arc<dyn KeychainApi>,
    dispatcher: Dispatcher,
    events: broadcast::Sender<SiteEvent>,
    tag_sync: Mutex<Option<AbortHandle>>,
}

/// A configured remote source.
#[derive(Clone)]
pub struct Site {
    inner: Arc<SiteInner>,
}

impl Site {
    /// Creates a builder for the given config.
    pub fn builder(config: SiteConfig) -> SiteBuilder {
        SiteBuilder::new(config)
    }

    fn login_state(&self) -> MutexGuard<'_, LoginCoordinator> {
        self.inner.login.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: SiteEvent) {
        trace!(site = %self.name(), event = event.kind(), "Emitting site event");
        // no subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Re-reads `ssl` and `cookies` from settings.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL cannot be parsed.
    pub fn load_config(&self) -> Result<(), SiteError> {
        let ssl = self.setting(keys::SSL, true);
        let requests = RequestBuilder::new(&self.inner.config.url, ssl)?;
        *self.inner.requests.write().unwrap_or_else(PoisonError::into_inner) = requests;
        self.reset_cookie_jar();

        debug!(site = %self.name(), ssl, "Loaded site config");
        Ok(())
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Source type.
    pub fn site_type(&self) -> &str {
        &self.inner.config.site_type
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Base URL as configured.
    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// Static config.
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    /// Returns true if the source information has `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.config.info.contains_key(key)
    }

    /// Source information value for `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.inner.config.info.get(key).map(String::as_str)
    }

    // ========================================================================
    // Settings and Cookies
    // ========================================================================

    /// Reads a setting.
    pub fn setting<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.inner.settings.get(key, default)
    }

    /// Writes a setting, removing it when `value` equals `default`.
    ///
    /// `ssl` and `cookies` take effect on the next [`Site::load_config`].
    ///
    /// # Errors
    ///
    /// Returns error if `value` cannot be serialized.
    pub fn set_setting<T: Serialize + PartialEq>(&self, key: &str, value: &T, default: &T) -> Result<(), SiteError> {
        self.inner.settings.set(key, value, default)?;
        Ok(())
    }

    /// Flushes pending setting changes to disk.
    ///
    /// # Errors
    ///
    /// Returns error if a settings file cannot be written.
    pub async fn sync_settings(&self) -> Result<(), SiteError> {
        self.inner.settings.sync().await?;
        Ok(())
    }

    /// Layered settings of this site.
    pub fn settings(&self) -> &MixedSettings {
        &self.inner.settings
    }

    /// Cookies currently in the jar.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.inner.cookies.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Merges cookies into the jar, replacing same name, domain and path.
    pub fn add_cookies(&self, cookies: impl IntoIterator<Item = Cookie>) {
        let mut jar = self.inner.cookies.write().unwrap_or_else(PoisonError::into_inner);
        for cookie in cookies {
            jar.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
            jar.push(cookie);
        }
    }

    /// Replaces the jar with the cookies configured in settings.
    ///
    /// Session cookies from earlier logins are dropped.
    pub fn reset_cookie_jar(&self) {
        let configured: Vec<Cookie> = self.setting(keys::COOKIES, Vec::new());
        debug!(site = %self.name(), count = configured.len(), "Resetting cookie jar");
        *self.inner.cookies.write().unwrap_or_else(PoisonError::into_inner) = configured;
    }

    /// Shared tag database.
    pub fn tag_database(&self) -> Arc<dyn TagDatabase> {
        Arc::clone(&self.inner.tag_database)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Base URL after normalization.
    pub fn base_url(&self) -> Url {
        self.inner
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .base()
            .clone()
    }

    /// Resolves `raw` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns error for empty input, unparseable URLs or non-http schemes.
    pub fn fix_url(&self, raw: &str) -> Result<Url, FetchError> {
        self.inner
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fix_url(raw)
    }

    /// Resolves `raw` against `previous`, for next-page links.
    ///
    /// # Errors
    ///
    /// Returns error for empty input, unparseable URLs or non-http schemes.
    pub fn fix_url_from(&self, raw: &str, previous: &Url) -> Result<Url, FetchError> {
        self.inner
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .fix_url_from(raw, previous)
    }

    /// Builds a request carrying the jar's matching cookies.
    pub fn make_request(&self, url: Url, context: RequestContext) -> SiteRequest {
        let cookies = self.cookies();
        self.inner
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .make_request(url, context, &cookies)
    }

    /// Fetches `url` and hands back the handle.
    ///
    /// # Errors
    ///
    /// Returns error if `url` cannot be normalized.
    #[instrument(skip(self, context), fields(site = %self.name()))]
    pub fn get(&self, url: &str, context: RequestContext) -> Result<FetchHandle, SiteError> {
        let url = self.fix_url(url)?;
        Ok(self.inner.dispatcher.get(self.make_request(url, context)))
    }

    /// Fetches `url` and runs `callback` on completion.
    ///
    /// Every completion is also published as [`SiteEvent::Finished`].
    ///
    /// # Errors
    ///
    /// Returns error if `url` cannot be normalized.
    #[instrument(skip(self, callback, context), fields(site = %self.name()))]
    pub fn get_async<F>(
        &self,
        query_type: QueryType,
        url: &str,
        callback: F,
        context: RequestContext,
    ) -> Result<RequestId, SiteError>
    where
        F: FnOnce(&SiteResponse) + Send + 'static,
    {
        let url = self.fix_url(url)?;
        let request = self.make_request(url, context);
        Ok(self.inner.dispatcher.get_async(query_type, request, callback))
    }

    /// The site's dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    // ========================================================================
    // APIs
    // ========================================================================

    /// API variants in order, only authenticated ones if asked.
    pub fn get_apis(&self, filter_auth_only: bool) -> Vec<&ApiVariant> {
        self.inner.apis.get_apis(filter_auth_only)
    }

    /// First API variant.
    pub fn first_valid_api(&self) -> Option<&ApiVariant> {
        self.inner.apis.first_valid_api()
    }

    /// First API variant declaring every capability in `required`.
    pub fn first_api_with(&self, required: &[ApiCapability]) -> Option<&ApiVariant> {
        self.inner.apis.first_api_with(required)
    }

    /// API variant by name.
    pub fn get_api(&self, name: &str) -> Option<&ApiVariant> {
        self.inner.apis.get_api(name)
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Requests a login.
    ///
    /// Returns at once. A started attempt reports through
    /// [`SiteEvent::LoggedIn`] when it settles; the other outcomes are
    /// published immediately, except an attempt already pending which
    /// publishes nothing.
    pub fn login(&self, force: bool) -> LoginTrigger {
        let (trigger, capability, attempt) = {
            let mut login = self.login_state();
            let trigger = login.begin(force);
            (trigger, login.capability().cloned(), login.attempt())
        };
        debug!(site = %self.name(), ?trigger, force, "Login requested");

        if let Some(result) = trigger.immediate_result() {
            self.emit(SiteEvent::LoggedIn {
                site: self.name().to_string(),
                result,
            });
        }

        if let (LoginTrigger::Started, Some(capability)) = (trigger, capability) {
            self.spawn_login(capability, attempt);
        }
        trigger
    }

    fn spawn_login(&self, capability: Arc<dyn LoginCapability>, attempt: u64) {
        let site = self.clone();
        tokio::spawn(async move {
            let credentials = Credentials::resolve(
                capability.fields(),
                &site.inner.settings,
                site.inner.keychain.as_ref(),
                site.name(),
            )
            .await;
            info!(site = %site.name(), protocol = capability.name(), "Logging in");

            let task = tokio::spawn(async move { capability.login(&credentials).await });
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(site = %site.name(), error = %e, "Login task did not complete");
                    Err(LoginError::Cancelled)
                }
            };
            site.attempt_finished(attempt, result);
        });
    }

    fn attempt_finished(&self, attempt: u64, result: Result<LoginSession, LoginError>) {
        let recorded = self.login_state().finish_attempt(attempt, result.is_ok());
        match recorded {
            Some(recorded) => self.publish_login(recorded, result),
            None => debug!(site = %self.name(), attempt, "Discarding superseded login result"),
        }
    }

    /// Records the outcome of a login and publishes it.
    ///
    /// This overrides an attempt still pending: that attempt's own result
    /// is discarded when it arrives, so one notification is published per
    /// attempt. Session cookies of a successful login are merged into the
    /// jar.
    pub fn login_finished(&self, result: Result<LoginSession, LoginError>) -> LoginResult {
        let recorded = self.login_state().finish(result.is_ok());
        self.publish_login(recorded, result);
        recorded
    }

    fn publish_login(&self, recorded: LoginResult, result: Result<LoginSession, LoginError>) {
        match result {
            Ok(session) => self.add_cookies(session.cookies),
            Err(e) => warn!(site = %self.name(), error = %e, "Login failed"),
        }

        info!(site = %self.name(), result = %recorded, "Login finished");
        self.emit(SiteEvent::LoggedIn {
            site: self.name().to_string(),
            result: recorded,
        });
    }

    /// Current login status.
    pub fn login_status(&self) -> LoginStatus {
        self.login_state().status()
    }

    /// Returns true if logged in; `Unknown` counts as `treat_unknown_as_logged_in`.
    pub fn is_logged_in(&self, treat_unknown_as_logged_in: bool) -> bool {
        self.login_state().is_logged_in(treat_unknown_as_logged_in)
    }

    /// Returns true if the login protocol supports a live test.
    pub fn can_test_login(&self) -> bool {
        self.login_state().can_test_login()
    }

    /// Stores the auto-login preference.
    ///
    /// # Errors
    ///
    /// Returns error if the setting cannot be written.
    pub fn set_auto_login(&self, auto_login: bool) -> Result<(), SiteError> {
        self.set_setting(keys::AUTO_LOGIN, &auto_login, &true)
    }

    /// Auto-login preference.
    pub fn auto_login(&self) -> bool {
        self.setting(keys::AUTO_LOGIN, true)
    }

    /// Lets the login protocol add its parameters to `url`.
    pub fn fix_login_url(&self, url: &str, login_part: &str) -> String {
        let capability = self.login_state().capability().cloned();
        match capability {
            Some(capability) => capability.complement_url(url, login_part),
            None => url.to_string(),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes to site events.
    pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn replace_tag_sync(&self, handle: AbortHandle) -> Option<AbortHandle> {
        self.inner
            .tag_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("type", &self.site_type())
            .field("name", &self.name())
            .field("url", &self.url())
            .field("apis", &self.inner.apis.len())
            .field("login", &self.login_status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`Site`].
pub struct SiteBuilder {
    config: SiteConfig,
    apis: ApiRegistry,
    login: Option<Arc<dyn LoginCapability>>,
    context: Option<FetchContext>,
    settings: Option<MixedSettings>,
    tag_database: Option<Arc<dyn TagDatabase>>,
}

impl SiteBuilder {
    /// Creates a builder for the given config.
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            apis: ApiRegistry::new(),
            login: None,
            context: None,
            settings: None,
            tag_database: None,
        }
    }

    /// Registers an API variant after those already added.
    pub fn api(mut self, api: ApiVariant) -> Self {
        self.apis.register(api);
        self
    }

    /// Sets the login protocol.
    pub fn login(mut self, capability: Arc<dyn LoginCapability>) -> Self {
        self.login = Some(capability);
        self
    }

    /// Sets the fetch context (transport, keychain and dispatch settings).
    pub fn context(mut self, context: FetchContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the layered settings.
    pub fn settings(mut self, settings: MixedSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the shared tag database.
    pub fn tag_database(mut self, tag_database: Arc<dyn TagDatabase>) -> Self {
        self.tag_database = Some(tag_database);
        self
    }

    /// Builds the site and loads its config from settings.
    ///
    /// Without a context, the HTTP transport and system keychain are used.
    /// Without settings, a single in-memory layer is used.
    ///
    /// # Errors
    ///
    /// Returns error if the config is incomplete or the base URL is invalid.
    pub fn build(self) -> Result<Site, SiteError> {
        if self.config.url.trim().is_empty() {
            return Err(SiteError::InvalidConfig("site URL is empty".into()));
        }
        if self.config.site_type.trim().is_empty() {
            return Err(SiteError::InvalidConfig("site type is empty".into()));
        }

        let context = match self.context {
            Some(context) => context,
            None => FetchContext::new()?,
        };
        let settings = self.settings.unwrap_or_else(MixedSettings::in_memory);
        let requests = RequestBuilder::new(&self.config.url, settings.get(keys::SSL, true))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let dispatcher = context.dispatcher();
        let finished = events.clone();
        dispatcher.set_finished_observer(Arc::new(move |response| {
            let _ = finished.send(SiteEvent::Finished(response));
        }));

        let site = Site {
            inner: Arc::new(SiteInner {
                login: Mutex::new(LoginCoordinator::new(self.login, self.config.requires_login)),
                config: self.config,
                requests: RwLock::new(requests),
                apis: self.apis,
                cookies: RwLock::new(Vec::new()),
                settings,
                tag_database: self
                    .tag_database
                    .unwrap_or_else(|| Arc::new(InMemoryTagDatabase::new())),
                keychain: Arc::clone(&context.keychain),
                dispatcher,
                events,
                tag_sync: Mutex::new(None),
            }),
        };
        site.reset_cookie_jar();

        info!(
            site = %site.name(),
            site_type = %site.site_type(),
            apis = site.inner.apis.len(),
            transport = context.transport.name(),
            "Site ready"
        );
        Ok(site)
    }
}

// ============================================================================
// Tests
// ============================================================================
