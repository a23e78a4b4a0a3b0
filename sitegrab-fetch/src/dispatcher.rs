//! Non-blocking fetch dispatch with callback completion.
//!
//! [`Dispatcher::get_async`] records a pending callback, hands the request
//! to the transport on a spawned task and returns immediately. When the
//! transport answers, the completion hook takes the pending record, runs
//! its callback with the response and then notifies the finished observer.
//!
//! ## Dispatch Modes
//!
//! - [`DispatchMode::Keyed`] keeps one record per request id, so any number
//!   of fetches may be outstanding and each callback gets its own response.
//! - [`DispatchMode::SingleSlot`] keeps a single record. Issuing a fetch
//!   overwrites it, and whichever completion arrives first consumes it. A
//!   completion that finds the slot empty is dropped without running any
//!   callback. Callers in this mode must keep at most one fetch in flight.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use sitegrab_core::QueryType;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};
use url::Url;

use crate::error::FetchError;
use crate::request::SiteRequest;
use crate::transport::{SiteResponse, Transport};

/// Completion callback for an async fetch.
pub type FetchCallback = Box<dyn FnOnce(&SiteResponse) + Send + 'static>;

/// Observer notified after every completed async fetch.
pub type FinishedObserver = Arc<dyn Fn(Arc<SiteResponse>) + Send + Sync>;

// ============================================================================
// Dispatch Mode
// ============================================================================

/// How pending callbacks are tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One record per request.
    #[default]
    Keyed,
    /// A single record, overwritten by every new fetch.
    SingleSlot,
}

// ============================================================================
// Request Id
// ============================================================================

/// Identifier handed out for every async fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    /// Raw value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Pending Table
// ============================================================================

struct PendingCallback {
    id: RequestId,
    query_type: QueryType,
    url: Url,
    callback: FetchCallback,
}

enum PendingTable {
    Keyed(HashMap<RequestId, PendingCallback>),
    SingleSlot(Option<PendingCallback>),
}

impl PendingTable {
    fn new(mode: DispatchMode) -> Self {
        match mode {
            DispatchMode::Keyed => Self::Keyed(HashMap::new()),
            DispatchMode::SingleSlot => Self::SingleSlot(None),
        }
    }

    /// Records a callback, returning the one it displaced.
    fn insert(&mut self, pending: PendingCallback) -> Option<PendingCallback> {
        match self {
            Self::Keyed(map) => map.insert(pending.id, pending),
            Self::SingleSlot(slot) => slot.replace(pending),
        }
    }

    /// Takes the record a completion for `id` should consume.
    fn take(&mut self, id: RequestId) -> Option<PendingCallback> {
        match self {
            Self::Keyed(map) => map.remove(&id),
            // whoever completes first gets the slot
            Self::SingleSlot(slot) => slot.take(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Keyed(map) => map.len(),
            Self::SingleSlot(slot) => usize::from(slot.is_some()),
        }
    }
}

// ============================================================================
// Fetch Handle
// ============================================================================

/// Handle to a fetch issued without callback bookkeeping.
#[derive(Debug)]
pub struct FetchHandle {
    url: Url,
    task: JoinHandle<SiteResponse>,
}

impl FetchHandle {
    /// URL being fetched.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Aborts the fetch.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Waits for the transport's response.
    ///
    /// An aborted or panicked task yields a response carrying
    /// [`FetchError::Cancelled`].
    pub async fn wait(self) -> SiteResponse {
        match self.task.await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %self.url, error = %e, "Fetch task did not complete");
                SiteResponse::failed(self.url, FetchError::Cancelled)
            }
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    mode: DispatchMode,
    next_id: AtomicU64,
    pending: Mutex<PendingTable>,
    observer: RwLock<Option<FinishedObserver>>,
}

impl DispatcherInner {
    fn pending(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Completion hook run by the fetch task.
    fn complete(&self, id: RequestId, response: SiteResponse) {
        let pending = self.pending().take(id);
        let response = Arc::new(response);

        match pending {
            Some(pending) => {
                if pending.id != id {
                    debug!(
                        request_id = %id,
                        consumed = %pending.id,
                        "Completion consumed a newer pending callback"
                    );
                }
                trace!(
                    request_id = %pending.id,
                    query_type = %pending.query_type,
                    url = %pending.url,
                    "Running fetch callback"
                );
                (pending.callback)(&response);
            }
            None => {
                debug!(request_id = %id, url = %response.url, "No pending callback, dropping completion");
            }
        }

        let observer = self
            .observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(response);
        }
    }
}

/// Issues fetches through a transport and routes completions to callbacks.
///
/// Cloning is cheap; clones share the pending table.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given transport.
    pub fn new(transport: Arc<dyn Transport>, mode: DispatchMode) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                mode,
                next_id: AtomicU64::new(1),
                pending: Mutex::new(PendingTable::new(mode)),
                observer: RwLock::new(None),
            }),
        }
    }

    /// Returns the dispatch mode.
    pub fn mode(&self) -> DispatchMode {
        self.inner.mode
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Sets the observer notified after every async completion.
    pub fn set_finished_observer(&self, observer: FinishedObserver) {
        *self
            .inner
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    /// Number of callbacks waiting for their response.
    pub fn pending_count(&self) -> usize {
        self.inner.pending().len()
    }

    /// Issues a fetch and returns immediately.
    ///
    /// `callback` runs on the completion task once the transport answers,
    /// unless the record was displaced first (see [`DispatchMode`]).
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self, request, callback), fields(url = %request.url, query_type = %query_type))]
    pub fn get_async<F>(&self, query_type: QueryType, mut request: SiteRequest, callback: F) -> RequestId
    where
        F: FnOnce(&SiteResponse) + Send + 'static,
    {
        request.query_type = Some(query_type);
        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        let pending = PendingCallback {
            id,
            query_type,
            url: request.url.clone(),
            callback: Box::new(callback),
        };
        if let Some(displaced) = self.inner.pending().insert(pending) {
            debug!(
                request_id = %id,
                displaced = %displaced.id,
                "Pending callback overwritten"
            );
        }

        debug!(request_id = %id, transport = self.inner.transport.name(), "Dispatching fetch");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let response = inner.transport.perform(&request).await;
            inner.complete(id, response);
        });

        id
    }

    /// Issues a fetch without callback bookkeeping.
    ///
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub fn get(&self, request: SiteRequest) -> FetchHandle {
        let transport = Arc::clone(&self.inner.transport);
        let url = request.url.clone();
        let task = tokio::spawn(async move { transport.perform(&request).await });
        FetchHandle { url, task }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mode", &self.inner.mode)
            .field("transport", &self.inner.transport.name())
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
