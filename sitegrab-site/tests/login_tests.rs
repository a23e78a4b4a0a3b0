//! Integration tests for site login.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{drain, wait_for};
use sitegrab_core::{Cookie, LoginResult, LoginStatus};
use sitegrab_fetch::{DispatchMode, FetchContext, MemoryKeychain, MockTransport};
use sitegrab_site::{
    Credentials, LoginCapability, LoginError, LoginSession, LoginTrigger, Site, SiteConfig, SiteEvent,
};
use sitegrab_store::MixedSettings;
use tokio::sync::Notify;

/// Login protocol that counts its calls and records what it was given.
struct CountingLogin {
    calls: AtomicUsize,
    accept: bool,
    seen: Mutex<Option<Credentials>>,
}

impl CountingLogin {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            accept: true,
            seen: Mutex::new(None),
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            accept: false,
            seen: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginCapability for CountingLogin {
    fn name(&self) -> &str {
        "post"
    }

    fn is_testable(&self) -> bool {
        true
    }

    async fn login(&self, credentials: &Credentials) -> Result<LoginSession, LoginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock().unwrap() = Some(credentials.clone());
        if self.accept {
            Ok(LoginSession::with_cookies(vec![Cookie::new("session", "abc123")]))
        } else {
            Err(LoginError::Rejected("wrong password".into()))
        }
    }

    fn complement_url(&self, url: &str, login_part: &str) -> String {
        format!("{url}&{login_part}")
    }
}

/// Login protocol that waits until released, then succeeds.
struct GatedLogin {
    gate: Notify,
    done: AtomicUsize,
}

#[async_trait]
impl LoginCapability for GatedLogin {
    fn name(&self) -> &str {
        "oauth2"
    }

    async fn login(&self, _credentials: &Credentials) -> Result<LoginSession, LoginError> {
        self.gate.notified().await;
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(LoginSession::with_cookies(vec![Cookie::new("session", "late")]))
    }
}

fn context(keychain: MemoryKeychain) -> FetchContext {
    FetchContext::builder()
        .transport(Arc::new(MockTransport::new()))
        .keychain(Arc::new(keychain))
        .dispatch_mode(DispatchMode::Keyed)
        .build()
        .unwrap()
}

fn site_with(config: SiteConfig, capability: Option<Arc<CountingLogin>>) -> Site {
    let mut builder = Site::builder(config).context(context(MemoryKeychain::new()));
    if let Some(capability) = capability {
        builder = builder.login(capability);
    }
    builder.build().unwrap()
}

fn is_logged_in_event(event: &SiteEvent) -> bool {
    matches!(event, SiteEvent::LoggedIn { .. })
}

fn login_result(event: &SiteEvent) -> Option<LoginResult> {
    match event {
        SiteEvent::LoggedIn { result, .. } => Some(*result),
        _ => None,
    }
}

#[tokio::test]
async fn test_login_runs_capability_once() {
    let capability = CountingLogin::accepting();
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(capability.clone()));
    let mut events = site.subscribe();

    assert_eq!(site.login(false), LoginTrigger::Started);
    assert_eq!(site.login_status(), LoginStatus::Pending);

    let event = wait_for(&mut events, is_logged_in_event).await;
    assert_eq!(login_result(&event), Some(LoginResult::Success));
    assert_eq!(site.login_status(), LoginStatus::LoggedIn);

    assert_eq!(site.login(false), LoginTrigger::Already);
    assert_eq!(site.login(false), LoginTrigger::Already);
    assert_eq!(capability.calls(), 1);

    let repeats: Vec<_> = drain(&mut events).iter().filter_map(login_result).collect();
    assert_eq!(repeats, [LoginResult::ALREADY, LoginResult::ALREADY]);
}

#[tokio::test]
async fn test_login_while_pending_is_ignored() {
    let capability = CountingLogin::accepting();
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(capability.clone()));
    let mut events = site.subscribe();

    assert_eq!(site.login(false), LoginTrigger::Started);
    assert_eq!(site.login(true), LoginTrigger::AlreadyPending);

    wait_for(&mut events, is_logged_in_event).await;
    assert_eq!(capability.calls(), 1);
}

#[tokio::test]
async fn test_forced_login_runs_again() {
    let capability = CountingLogin::accepting();
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(capability.clone()));
    let mut events = site.subscribe();

    site.login(false);
    wait_for(&mut events, is_logged_in_event).await;

    assert_eq!(site.login(true), LoginTrigger::Started);
    wait_for(&mut events, is_logged_in_event).await;
    assert_eq!(capability.calls(), 2);
}

#[tokio::test]
async fn test_successful_login_merges_session_cookies() {
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(CountingLogin::accepting()));
    let mut events = site.subscribe();

    site.login(false);
    wait_for(&mut events, is_logged_in_event).await;

    assert!(site.cookies().iter().any(|c| c.name == "session" && c.value == "abc123"));
    assert!(site.is_logged_in(false));
}

#[tokio::test]
async fn test_rejected_login_logs_out() {
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(CountingLogin::rejecting()));
    let mut events = site.subscribe();

    site.login(false);
    let event = wait_for(&mut events, is_logged_in_event).await;

    assert_eq!(login_result(&event), Some(LoginResult::Error));
    assert_eq!(site.login_status(), LoginStatus::LoggedOut);
    assert!(!site.is_logged_in(false));
    assert!(!site.is_logged_in(true));
    assert!(site.cookies().is_empty());
}

#[tokio::test]
async fn test_login_finished_sets_status_directly() {
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(CountingLogin::accepting()));

    assert!(site.is_logged_in(true));
    assert!(!site.is_logged_in(false));

    assert_eq!(site.login_finished(Ok(LoginSession::default())), LoginResult::Success);
    assert!(site.is_logged_in(false));

    let failed = site.login_finished(Err(LoginError::MissingCredential("password".into())));
    assert_eq!(failed, LoginResult::Error);
    assert!(!site.is_logged_in(false));
}

#[tokio::test]
async fn test_login_without_protocol() {
    let optional = site_with(SiteConfig::new("Html", "booru.test"), None);
    let mut events = optional.subscribe();
    assert_eq!(optional.login(false), LoginTrigger::NotRequired);
    assert!(optional.is_logged_in(false));
    assert_eq!(
        drain(&mut events).iter().filter_map(login_result).collect::<Vec<_>>(),
        [LoginResult::Impossible]
    );

    let required = site_with(SiteConfig::new("Html", "private.test").requiring_login(), None);
    let mut events = required.subscribe();
    assert_eq!(required.login(false), LoginTrigger::Impossible);
    assert_eq!(required.login_status(), LoginStatus::Unknown);
    assert_eq!(
        drain(&mut events).iter().filter_map(login_result).collect::<Vec<_>>(),
        [LoginResult::Impossible]
    );
    assert!(!required.can_test_login());
}

#[tokio::test]
async fn test_credentials_come_from_settings_then_keychain() {
    let capability = CountingLogin::accepting();
    let settings = MixedSettings::in_memory();
    settings
        .set("auth/username", &"alice".to_string(), &String::new())
        .unwrap();
    let keychain = MemoryKeychain::new()
        .with_entry("booru.test", "username", "mallory")
        .with_entry("booru.test", "password", "hunter2");

    let site = Site::builder(SiteConfig::new("Danbooru", "booru.test"))
        .context(context(keychain))
        .settings(settings)
        .login(capability.clone())
        .build()
        .unwrap();
    let mut events = site.subscribe();

    site.login(false);
    wait_for(&mut events, is_logged_in_event).await;

    let seen = capability.seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.get("username"), Some("alice"));
    assert_eq!(seen.get("password"), Some("hunter2"));
}

#[tokio::test]
async fn test_login_url_and_testability() {
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), Some(CountingLogin::accepting()));
    assert!(site.can_test_login());
    assert_eq!(
        site.fix_login_url("https://booru.test/posts.json?page=1", "login=alice"),
        "https://booru.test/posts.json?page=1&login=alice"
    );

    let plain = site_with(SiteConfig::new("Html", "booru.test"), None);
    assert_eq!(plain.fix_login_url("/posts", "login=alice"), "/posts");
}

#[tokio::test]
async fn test_auto_login_setting() {
    let site = site_with(SiteConfig::new("Danbooru", "booru.test"), None);
    assert!(site.auto_login());
    site.set_auto_login(false).unwrap();
    assert!(!site.auto_login());
    assert!(!site.setting::<bool>("login/auto_login", true));
}

#[tokio::test]
async fn test_login_finished_overrides_pending_attempt() {
    let capability = Arc::new(GatedLogin {
        gate: Notify::new(),
        done: AtomicUsize::new(0),
    });
    let site = Site::builder(SiteConfig::new("Danbooru", "booru.test"))
        .context(context(MemoryKeychain::new()))
        .login(capability.clone())
        .build()
        .unwrap();
    let mut events = site.subscribe();

    assert_eq!(site.login(false), LoginTrigger::Started);
    let overridden = site.login_finished(Err(LoginError::Rejected("signed out".into())));
    assert_eq!(overridden, LoginResult::Error);

    capability.gate.notify_one();
    while capability.done.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    let results: Vec<_> = drain(&mut events).iter().filter_map(login_result).collect();
    assert_eq!(results, [LoginResult::Error]);
    assert_eq!(site.login_status(), LoginStatus::LoggedOut);
    assert!(site.cookies().is_empty());
}
