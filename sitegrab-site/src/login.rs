//! Login state machine and the pluggable login capability.
//!
//! [`LoginCoordinator`] only decides transitions. The [`Site`](crate::Site)
//! runs the capability on a spawned task and reports back through
//! [`Site::login_finished`](crate::Site::login_finished).

use async_trait::async_trait;
use sitegrab_core::{Cookie, LoginResult, LoginStatus};
use sitegrab_fetch::host::keychain::accounts;
use sitegrab_fetch::{FetchError, KeychainApi};
use sitegrab_store::MixedSettings;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::site::keys::AUTH_PREFIX;

/// Default credential fields.
pub const DEFAULT_FIELDS: &[&str] = &[accounts::USERNAME, accounts::PASSWORD];

// ============================================================================
// Credentials
// ============================================================================

/// Credential values keyed by field name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    fields: BTreeMap<String, String>,
}

impl Credentials {
    /// Creates empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Value of `field`, if known.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Returns true if every field in `required` has a value.
    pub fn has_all(&self, required: &[&str]) -> bool {
        required.iter().all(|f| self.fields.contains_key(*f))
    }

    /// Returns true if no field is known.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolves `fields` from settings keys `auth/<field>`, then the keychain.
    ///
    /// Fields found nowhere are left out; the capability decides whether it
    /// can log in without them.
    pub async fn resolve(
        fields: &[&str],
        settings: &MixedSettings,
        keychain: &dyn KeychainApi,
        service: &str,
    ) -> Self {
        let mut credentials = Self::new();
        for field in fields {
            let stored: String = settings.get(&format!("{AUTH_PREFIX}{field}"), String::new());
            if !stored.is_empty() {
                credentials.fields.insert((*field).to_string(), stored);
                continue;
            }

            match keychain.get(service, field).await {
                Ok(Some(secret)) => {
                    debug!(service, field = %field, "Credential taken from keychain");
                    credentials.fields.insert((*field).to_string(), secret);
                }
                Ok(None) => debug!(service, field = %field, "Credential not configured"),
                Err(e) => warn!(service, field = %field, error = %e, "Keychain lookup failed"),
            }
        }
        credentials
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // values stay out of logs
        f.debug_struct("Credentials")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Login Capability
// ============================================================================

/// What a successful login hands back.
#[derive(Debug, Clone, Default)]
pub struct LoginSession {
    /// Session cookies to merge into the site's jar.
    pub cookies: Vec<Cookie>,
}

impl LoginSession {
    /// Session carrying the given cookies.
    pub fn with_cookies(cookies: Vec<Cookie>) -> Self {
        Self { cookies }
    }
}

/// Errors reported by a login attempt.
#[derive(Debug, Error)]
pub enum LoginError {
    /// The site refused the credentials.
    #[error("Login rejected: {0}")]
    Rejected(String),

    /// A required credential field is missing.
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The login request itself failed.
    #[error("Login request failed: {0}")]
    Fetch(#[from] FetchError),

    /// The login task ended without reporting.
    #[error("Login attempt was cancelled")]
    Cancelled,
}

/// A site's login protocol.
///
/// Implementations perform whatever requests the protocol needs and
/// report the outcome once per call.
#[async_trait]
pub trait LoginCapability: Send + Sync {
    /// Protocol name for logs (e.g. `url`, `post`, `oauth2`).
    fn name(&self) -> &str;

    /// Returns true if a live test against the site is possible.
    fn is_testable(&self) -> bool {
        false
    }

    /// Credential fields the protocol reads.
    fn fields(&self) -> &[&str] {
        DEFAULT_FIELDS
    }

    /// Performs one login attempt.
    async fn login(&self, credentials: &Credentials) -> Result<LoginSession, LoginError>;

    /// Adds login parameters to a query URL.
    fn complement_url(&self, url: &str, _login_part: &str) -> String {
        url.to_string()
    }
}

// ============================================================================
// Login Trigger
// ============================================================================

/// What a call to `login` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginTrigger {
    /// An attempt was started in the background.
    Started,
    /// An attempt is already running.
    AlreadyPending,
    /// Status is settled and the call was not forced.
    Already,
    /// No protocol and none needed: the site counts as logged in.
    NotRequired,
    /// Authentication is required but no protocol is configured.
    Impossible,
}

impl LoginTrigger {
    /// Result to report immediately, if any.
    pub fn immediate_result(self) -> Option<LoginResult> {
        match self {
            Self::Started | Self::AlreadyPending => None,
            Self::Already => Some(LoginResult::ALREADY),
            Self::NotRequired | Self::Impossible => Some(LoginResult::IMPOSSIBLE),
        }
    }
}

// ============================================================================
// Login Coordinator
// ============================================================================

/// Login status transitions for one site.
pub struct LoginCoordinator {
    status: LoginStatus,
    capability: Option<Arc<dyn LoginCapability>>,
    requires_login: bool,
    attempt: u64,
}

impl LoginCoordinator {
    /// Creates a coordinator in [`LoginStatus::Unknown`].
    pub fn new(capability: Option<Arc<dyn LoginCapability>>, requires_login: bool) -> Self {
        Self {
            status: LoginStatus::Unknown,
            capability,
            requires_login,
            attempt: 0,
        }
    }

    /// Current status.
    pub fn status(&self) -> LoginStatus {
        self.status
    }

    /// Number of the latest started attempt.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// The configured protocol.
    pub fn capability(&self) -> Option<&Arc<dyn LoginCapability>> {
        self.capability.as_ref()
    }

    /// Decides what a login request does and applies the transition.
    pub fn begin(&mut self, force: bool) -> LoginTrigger {
        match self.status {
            LoginStatus::Pending => LoginTrigger::AlreadyPending,
            LoginStatus::LoggedIn | LoginStatus::LoggedOut if !force => LoginTrigger::Already,
            _ => match (&self.capability, self.requires_login) {
                (Some(_), _) => {
                    self.status = LoginStatus::Pending;
                    self.attempt = self.attempt.wrapping_add(1);
                    LoginTrigger::Started
                }
                (None, false) => {
                    self.status = LoginStatus::LoggedIn;
                    LoginTrigger::NotRequired
                }
                (None, true) => LoginTrigger::Impossible,
            },
        }
    }

    /// Records the outcome of attempt `attempt`.
    ///
    /// Returns `None` and changes nothing if that attempt is no longer the
    /// pending one, because it was overridden or superseded.
    pub fn finish_attempt(&mut self, attempt: u64, success: bool) -> Option<LoginResult> {
        if self.status != LoginStatus::Pending || attempt != self.attempt {
            debug!(attempt, current = self.attempt, status = %self.status, "Stale login attempt");
            return None;
        }
        Some(self.finish(success))
    }

    /// Sets the status from an outcome, overriding any pending attempt.
    pub fn finish(&mut self, success: bool) -> LoginResult {
        if success {
            self.status = LoginStatus::LoggedIn;
            LoginResult::Success
        } else {
            self.status = LoginStatus::LoggedOut;
            LoginResult::Error
        }
    }

    /// Returns true if logged in; `Unknown` counts as `treat_unknown_as_logged_in`.
    pub fn is_logged_in(&self, treat_unknown_as_logged_in: bool) -> bool {
        match self.status {
            LoginStatus::LoggedIn => true,
            LoginStatus::Unknown => treat_unknown_as_logged_in,
            LoginStatus::Pending | LoginStatus::LoggedOut => false,
        }
    }

    /// Returns true if the protocol supports a live test.
    pub fn can_test_login(&self) -> bool {
        self.capability.as_ref().is_some_and(|c| c.is_testable())
    }
}

impl fmt::Debug for LoginCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCoordinator")
            .field("status", &self.status)
            .field("capability", &self.capability.as_ref().map(|c| c.name().to_string()))
            .field("requires_login", &self.requires_login)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sitegrab_fetch::MemoryKeychain;
    use sitegrab_store::SettingsStore;

    struct UrlLogin;

    #[async_trait]
    impl LoginCapability for UrlLogin {
        fn name(&self) -> &str {
            "url"
        }

        fn is_testable(&self) -> bool {
            true
        }

        async fn login(&self, _credentials: &Credentials) -> Result<LoginSession, LoginError> {
            Ok(LoginSession::default())
        }
    }

    fn with_capability() -> LoginCoordinator {
        LoginCoordinator::new(Some(Arc::new(UrlLogin)), true)
    }

    #[test]
    fn test_begin_starts_once() {
        let mut login = with_capability();
        assert_eq!(login.begin(false), LoginTrigger::Started);
        assert_eq!(login.status(), LoginStatus::Pending);
        assert_eq!(login.begin(false), LoginTrigger::AlreadyPending);
        assert_eq!(login.begin(true), LoginTrigger::AlreadyPending);
    }

    #[test]
    fn test_settled_status_needs_force() {
        let mut login = with_capability();
        login.begin(false);
        assert_eq!(login.finish(true), LoginResult::Success);

        assert_eq!(login.begin(false), LoginTrigger::Already);
        assert_eq!(login.status(), LoginStatus::LoggedIn);
        assert_eq!(login.begin(true), LoginTrigger::Started);
    }

    #[test]
    fn test_stale_attempt_is_ignored() {
        let mut login = with_capability();
        login.begin(false);
        let first = login.attempt();

        // overridden while pending
        assert_eq!(login.finish(false), LoginResult::Error);
        assert_eq!(login.finish_attempt(first, true), None);
        assert_eq!(login.status(), LoginStatus::LoggedOut);

        login.begin(true);
        assert_eq!(login.finish_attempt(first, true), None);
        assert_eq!(login.status(), LoginStatus::Pending);
        assert_eq!(login.finish_attempt(login.attempt(), true), Some(LoginResult::Success));
        assert_eq!(login.finish_attempt(login.attempt(), false), None);
        assert_eq!(login.status(), LoginStatus::LoggedIn);
    }

    #[test]
    fn test_no_capability() {
        let mut optional = LoginCoordinator::new(None, false);
        assert_eq!(optional.begin(false), LoginTrigger::NotRequired);
        assert!(optional.is_logged_in(false));

        let mut required = LoginCoordinator::new(None, true);
        assert_eq!(required.begin(false), LoginTrigger::Impossible);
        assert_eq!(required.status(), LoginStatus::Unknown);
        assert!(!required.can_test_login());
    }

    #[test]
    fn test_is_logged_in() {
        let mut login = with_capability();
        assert!(login.is_logged_in(true));
        assert!(!login.is_logged_in(false));

        login.begin(false);
        assert!(!login.is_logged_in(true));

        assert_eq!(login.finish(false), LoginResult::Error);
        assert!(!login.is_logged_in(true));
        assert!(login.can_test_login());
    }

    #[test]
    fn test_immediate_results() {
        assert_eq!(LoginTrigger::Already.immediate_result(), Some(LoginResult::ALREADY));
        assert_eq!(LoginTrigger::Impossible.immediate_result(), Some(LoginResult::Impossible));
        assert_eq!(LoginTrigger::Started.immediate_result(), None);
    }

    #[tokio::test]
    async fn test_credentials_prefer_settings_over_keychain() {
        let settings = MixedSettings::new(vec![Arc::new(SettingsStore::in_memory())]).unwrap();
        settings.set("auth/username", &"alice".to_string(), &String::new()).unwrap();
        let keychain = MemoryKeychain::new()
            .with_entry("booru", "username", "mallory")
            .with_entry("booru", "password", "hunter2");

        let credentials = Credentials::resolve(DEFAULT_FIELDS, &settings, &keychain, "booru").await;
        assert_eq!(credentials.get("username"), Some("alice"));
        assert_eq!(credentials.get("password"), Some("hunter2"));
        assert!(credentials.has_all(DEFAULT_FIELDS));
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_missing_credentials_are_left_out() {
        let settings = MixedSettings::in_memory();
        let credentials = Credentials::resolve(&["api_key"], &settings, &MemoryKeychain::new(), "booru").await;
        assert!(credentials.is_empty());
    }
}
