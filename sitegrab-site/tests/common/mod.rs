//! Shared fixtures for site integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sitegrab_core::Tag;
use sitegrab_fetch::{DispatchMode, FetchContext, MemoryKeychain, MockTransport, SiteResponse};
use sitegrab_site::{ApiError, ApiVariant, Site, SiteConfig, SiteEvent};
use tokio::sync::broadcast;

pub const TAGS_URL: &str = "/tags.json?page={page}&limit={limit}";

pub fn context(transport: &Arc<MockTransport>, mode: DispatchMode) -> FetchContext {
    FetchContext::builder()
        .transport(transport.clone())
        .keychain(Arc::new(MemoryKeychain::new()))
        .dispatch_mode(mode)
        .build()
        .unwrap()
}

pub fn site(transport: &Arc<MockTransport>, mode: DispatchMode) -> Site {
    Site::builder(SiteConfig::new("Danbooru", "booru.test"))
        .api(tag_api())
        .context(context(transport, mode))
        .build()
        .unwrap()
}

pub fn tag_api() -> ApiVariant {
    ApiVariant::builder("Danbooru (2.0)")
        .authenticated()
        .tag_listing(TAGS_URL, parse_names)
        .build()
}

/// Parses a JSON array of tag names.
pub fn parse_names(response: &SiteResponse) -> Result<Vec<Tag>, ApiError> {
    let names: Vec<String> = serde_json::from_slice(&response.body)?;
    Ok(names.into_iter().map(Tag::new).collect())
}

pub fn tags_url(page: u32, limit: u32) -> String {
    format!("https://booru.test/tags.json?page={page}&limit={limit}")
}

pub fn tag_page(range: std::ops::Range<usize>) -> String {
    let names: Vec<String> = range.map(|i| format!("tag_{i}")).collect();
    serde_json::to_string(&names).unwrap()
}

pub async fn next_event(events: &mut broadcast::Receiver<SiteEvent>) -> SiteEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a site event")
        .expect("event channel closed")
}

/// Waits for the next event matching `pred`, skipping others.
pub async fn wait_for<F>(events: &mut broadcast::Receiver<SiteEvent>, pred: F) -> SiteEvent
where
    F: Fn(&SiteEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Drains events already published.
pub fn drain(events: &mut broadcast::Receiver<SiteEvent>) -> Vec<SiteEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}
