//! Integration tests for fetch dispatch through a site.

mod common;

use std::sync::Arc;

use common::{site, wait_for};
use sitegrab_core::{Cookie, QueryType};
use sitegrab_fetch::{DispatchMode, MockTransport, RequestContext};
use sitegrab_site::{Site, SiteConfig, SiteEvent};
use sitegrab_store::{MixedSettings, SettingsStore};
use tokio::sync::mpsc;

const A: &str = "https://booru.test/a";
const B: &str = "https://booru.test/b";

fn two_routes() -> Arc<MockTransport> {
    Arc::new(
        MockTransport::gated()
            .with_response(A, 200, "A")
            .with_response(B, 200, "B"),
    )
}

fn is_finished(event: &SiteEvent) -> bool {
    matches!(event, SiteEvent::Finished(_))
}

/// Issues `/a` then `/b`, each callback reporting `(label, body)`.
fn issue_both(site: &Site) -> mpsc::UnboundedReceiver<(&'static str, String)> {
    let (tx, rx) = mpsc::unbounded_channel();
    for (label, path) in [("a", "/a"), ("b", "/b")] {
        let tx = tx.clone();
        site.get_async(
            QueryType::List,
            path,
            move |response| {
                let _ = tx.send((label, response.text().into_owned()));
            },
            RequestContext::new(),
        )
        .unwrap();
    }
    rx
}

fn collect(rx: &mut mpsc::UnboundedReceiver<(&'static str, String)>) -> Vec<(&'static str, String)> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

#[tokio::test]
async fn test_single_slot_latest_callback_takes_first_completion() {
    let transport = two_routes();
    let site = site(&transport, DispatchMode::SingleSlot);
    let mut events = site.subscribe();

    let mut rx = issue_both(&site);
    transport.wait_for_requests(2).await;

    assert!(transport.release(A));
    let first = wait_for(&mut events, is_finished).await;
    assert!(transport.release(B));
    let second = wait_for(&mut events, is_finished).await;

    // b's callback saw a's response and a's callback never ran
    assert_eq!(collect(&mut rx), [("b", "A".to_string())]);
    assert_eq!(site.dispatcher().pending_count(), 0);

    let urls: Vec<_> = [first, second]
        .into_iter()
        .filter_map(|e| match e {
            SiteEvent::Finished(response) => Some(response.url.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(urls, [A, B]);
}

#[tokio::test]
async fn test_keyed_routes_each_response_to_its_callback() {
    let transport = two_routes();
    let site = site(&transport, DispatchMode::Keyed);
    let mut events = site.subscribe();

    let mut rx = issue_both(&site);
    transport.wait_for_requests(2).await;

    assert!(transport.release(B));
    wait_for(&mut events, is_finished).await;
    assert!(transport.release(A));
    wait_for(&mut events, is_finished).await;

    assert_eq!(
        collect(&mut rx),
        [("b", "B".to_string()), ("a", "A".to_string())]
    );
    assert_eq!(site.dispatcher().pending_count(), 0);
}

#[tokio::test]
async fn test_get_returns_handle_without_callback() {
    let transport = Arc::new(MockTransport::new().with_response("https://booru.test/posts.json", 200, "[]"));
    let site = site(&transport, DispatchMode::Keyed);

    let handle = site.get("/posts.json", RequestContext::new()).unwrap();
    assert_eq!(handle.url().as_str(), "https://booru.test/posts.json");

    let response = handle.wait().await;
    assert!(response.is_success());
    assert_eq!(response.text(), "[]");
    assert_eq!(site.dispatcher().pending_count(), 0);
}

#[tokio::test]
async fn test_requests_carry_cookies_and_referer() {
    let transport = Arc::new(MockTransport::new());
    let site = site(&transport, DispatchMode::Keyed);
    site.add_cookies([Cookie::new("session", "abc123")]);

    let response = site
        .get("/missing", RequestContext::new().with_referer("https://booru.test/posts"))
        .unwrap()
        .wait()
        .await;
    assert_eq!(response.status, Some(404));

    let requests = transport.requests();
    let request = requests.first().unwrap();
    assert_eq!(request.cookie_header(), Some("session=abc123"));
    assert_eq!(request.referer(), Some("https://booru.test/posts"));
}

#[tokio::test]
async fn test_session_cookie_not_sent_to_foreign_host() {
    let transport = Arc::new(MockTransport::new());
    let site = site(&transport, DispatchMode::Keyed);
    site.add_cookies([Cookie::new("session", "secret")]);

    site.get("https://evil.test/pixel.gif", RequestContext::new())
        .unwrap()
        .wait()
        .await;
    site.get("/posts.json", RequestContext::new()).unwrap().wait().await;

    let requests = transport.requests();
    assert_eq!(requests[0].url.host_str(), Some("evil.test"));
    assert_eq!(requests[0].cookie_header(), None);
    assert_eq!(requests[1].cookie_header(), Some("session=secret"));
}

#[tokio::test]
async fn test_settings_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("booru.json");

    let settings = MixedSettings::new(vec![Arc::new(SettingsStore::new(&path))]).unwrap();
    let transport = Arc::new(MockTransport::new());
    let site = Site::builder(SiteConfig::new("Danbooru", "booru.test"))
        .context(common::context(&transport, DispatchMode::Keyed))
        .settings(settings)
        .build()
        .unwrap();

    site.set_setting("ssl", &false, &true).unwrap();
    site.set_setting("download/max_concurrency", &4u32, &2u32).unwrap();
    site.sync_settings().await.unwrap();

    let reloaded = MixedSettings::new(vec![Arc::new(SettingsStore::load(&path).await.unwrap())]).unwrap();
    let site = Site::builder(SiteConfig::new("Danbooru", "booru.test"))
        .context(common::context(&transport, DispatchMode::Keyed))
        .settings(reloaded)
        .build()
        .unwrap();

    assert_eq!(site.setting("download/max_concurrency", 2u32), 4);
    assert_eq!(site.base_url().scheme(), "http");
}
