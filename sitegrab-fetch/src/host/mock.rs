//! In-memory transport for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::trace;

use crate::request::SiteRequest;
use crate::transport::{SiteResponse, Transport};

type Handler = Arc<dyn Fn(&SiteRequest) -> SiteResponse + Send + Sync>;

#[derive(Default)]
struct MockState {
    routes: HashMap<String, Handler>,
    requests: Vec<SiteRequest>,
    gates: Vec<(String, oneshot::Sender<()>)>,
}

/// Scriptable transport for tests.
///
/// Responses are keyed by the exact request URL; unknown URLs answer 404.
/// A gated transport holds every request until [`MockTransport::release`]
/// is called for its URL, which lets tests choose completion order.
///
/// # Examples
///
/// ```
/// use sitegrab_fetch::{MockTransport, SiteRequest, Transport};
/// use url::Url;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = MockTransport::new().with_response("https://booru.test/", 200, "hello");
/// let request = SiteRequest::new(Url::parse("https://booru.test/").unwrap());
///
/// let response = transport.perform(&request).await;
/// assert_eq!(response.text(), "hello");
/// assert_eq!(transport.request_count(), 1);
/// # }
/// ```
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    gated: bool,
}

impl MockTransport {
    /// Creates a transport that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that holds requests until released.
    pub fn gated() -> Self {
        Self {
            state: Mutex::default(),
            gated: true,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answers `url` with a fixed status and body.
    pub fn with_response(self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.with_handler(url, move |req| SiteResponse::new(req.url.clone(), status, body.clone()))
    }

    /// Answers `url` with a custom handler.
    pub fn with_handler<F>(self, url: &str, handler: F) -> Self
    where
        F: Fn(&SiteRequest) -> SiteResponse + Send + Sync + 'static,
    {
        self.state().routes.insert(url.to_string(), Arc::new(handler));
        self
    }

    /// Every request performed so far, in arrival order.
    pub fn requests(&self) -> Vec<SiteRequest> {
        self.state().requests.clone()
    }

    /// Number of requests performed so far.
    pub fn request_count(&self) -> usize {
        self.state().requests.len()
    }

    /// URLs requested so far, in arrival order.
    pub fn requested_urls(&self) -> Vec<String> {
        self.state()
            .requests
            .iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    /// Releases the oldest held request for `url`.
    ///
    /// Returns false if no request for `url` is being held.
    pub fn release(&self, url: &str) -> bool {
        let gate = {
            let mut state = self.state();
            let index = state.gates.iter().position(|(u, _)| u == url);
            index.map(|i| state.gates.remove(i).1)
        };
        gate.is_some_and(|tx| tx.send(()).is_ok())
    }

    /// Releases every held request.
    pub fn release_all(&self) -> usize {
        let gates = std::mem::take(&mut self.state().gates);
        gates
            .into_iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(_, tx)| tx.send(()))
            .filter(Result::is_ok)
            .count()
    }

    /// Yields until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn perform(&self, request: &SiteRequest) -> SiteResponse {
        let url = request.url.to_string();
        let gate = {
            let mut state = self.state();
            state.requests.push(request.clone());
            if self.gated {
                let (tx, rx) = oneshot::channel();
                state.gates.push((url.clone(), tx));
                Some(rx)
            } else {
                None
            }
        };

        if let Some(rx) = gate {
            trace!(url = %url, "Holding mock request");
            // a dropped sender releases the request too
            let _ = rx.await;
        }

        let handler = self.state().routes.get(&url).cloned();
        match handler {
            Some(handler) => handler(request),
            None => SiteResponse::new(request.url.clone(), 404, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> SiteRequest {
        SiteRequest::new(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_url_is_404() {
        let transport = MockTransport::new();
        let response = transport.perform(&request("https://a.test/missing")).await;
        assert_eq!(response.status, Some(404));
    }

    #[tokio::test]
    async fn test_release_unknown_url() {
        let transport = MockTransport::gated();
        assert!(!transport.release("https://a.test/"));
    }

    #[tokio::test]
    async fn test_gated_request_waits_for_release() {
        let transport = Arc::new(MockTransport::gated().with_response("https://a.test/", 200, "ok"));

        let t = Arc::clone(&transport);
        let task = tokio::spawn(async move { t.perform(&request("https://a.test/")).await });
        transport.wait_for_requests(1).await;
        assert!(!task.is_finished());

        assert_eq!(transport.release_all(), 1);
        let response = task.await.unwrap();
        assert_eq!(response.text(), "ok");
    }
}
