//! Paginated tag sync.
//!
//! A sync walks the tag listing of the site's first tag-listing API page by
//! page. Every page goes through the dispatcher as a `List` fetch, is
//! parsed by the API's parser and written to the tag database. The walk
//! stops on the first page holding fewer tags than requested.
//!
//! Exactly one of [`SiteEvent::FinishedLoadingTags`] or
//! [`SiteEvent::TagSyncFailed`] is published per sync, unless the sync is
//! aborted first.

use sitegrab_core::{ApiCapability, QueryType, Tag};
use sitegrab_fetch::{RequestContext, SiteResponse};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, TagParser};
use crate::events::SiteEvent;
use crate::site::Site;

// ============================================================================
// Errors
// ============================================================================

/// Why a tag sync stopped early.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TagSyncError {
    /// No API lists tags.
    #[error("No API of this site lists tags")]
    NoTagApi,

    /// The listing URL could not be built.
    #[error("Invalid tag listing URL for page {page}: {message}")]
    InvalidUrl {
        /// Page number.
        page: u32,
        /// Details.
        message: String,
    },

    /// The transport failed.
    #[error("Tag page {page} failed: {message}")]
    Transport {
        /// Page number.
        page: u32,
        /// Transport error text.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("Tag page {page} answered with status {status}")]
    Status {
        /// Page number.
        page: u32,
        /// HTTP status.
        status: u16,
    },

    /// The page could not be parsed.
    #[error("Tag page {page} could not be parsed: {source}")]
    Parse {
        /// Page number.
        page: u32,
        /// Parser error.
        source: ApiError,
    },

    /// The fetch callback was dropped without running.
    #[error("Tag page {page} was dropped before completion")]
    Dropped {
        /// Page number.
        page: u32,
    },

    /// The server kept returning full pages past the last page number.
    #[error("Tag listing still full at page {page}, no next page exists")]
    PageOutOfRange {
        /// Last page fetched.
        page: u32,
    },

    /// The sync task was aborted.
    #[error("Tag sync was aborted")]
    Aborted,
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a running tag sync.
#[derive(Debug)]
pub struct TagSyncHandle {
    task: JoinHandle<Result<Vec<Tag>, TagSyncError>>,
}

impl TagSyncHandle {
    /// Stops the sync. No event is published for it.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Returns true once the sync has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the sync and returns every tag it collected.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the sync, or
    /// [`TagSyncError::Aborted`] if it was aborted.
    pub async fn wait(self) -> Result<Vec<Tag>, TagSyncError> {
        self.task.await.unwrap_or(Err(TagSyncError::Aborted))
    }
}

// ============================================================================
// Loop State
// ============================================================================

#[derive(Debug)]
struct TagSyncState {
    next_page: u32,
    accumulated: Vec<Tag>,
}

impl TagSyncState {
    fn new(first_page: u32) -> Self {
        Self {
            next_page: first_page,
            accumulated: Vec::new(),
        }
    }

    /// Records a page and returns true if another page should be fetched.
    fn advance(&mut self, tags: Vec<Tag>, page_size: u32) -> Result<bool, TagSyncError> {
        let page = self.next_page;
        let full = !tags.is_empty() && usize::try_from(page_size).is_ok_and(|size| size == tags.len());
        self.accumulated.extend(tags);
        if !full {
            return Ok(false);
        }
        self.next_page = page.checked_add(1).ok_or(TagSyncError::PageOutOfRange { page })?;
        Ok(true)
    }
}

fn read_page(page: u32, response: &SiteResponse, parser: TagParser) -> Result<Vec<Tag>, TagSyncError> {
    if let Some(error) = &response.error {
        return Err(TagSyncError::Transport {
            page,
            message: error.to_string(),
        });
    }
    if !response.is_success() {
        return Err(TagSyncError::Status {
            page,
            status: response.status.unwrap_or_default(),
        });
    }
    parser(response).map_err(|source| TagSyncError::Parse { page, source })
}

// ============================================================================
// Site Integration
// ============================================================================

impl Site {
    /// Starts a tag sync at `page`, requesting `page_size` tags per page.
    ///
    /// A sync already running for this site is aborted. Must be called
    /// from within a Tokio runtime.
    pub fn load_tags(&self, page: u32, page_size: u32) -> TagSyncHandle {
        let site = self.clone();
        let task = tokio::spawn(async move {
            let result = site.sync_tags(page, page_size).await;
            match &result {
                Ok(tags) => {
                    info!(site = %site.name(), count = tags.len(), "Finished loading tags");
                    site.emit(SiteEvent::FinishedLoadingTags(tags.clone()));
                }
                Err(error) => {
                    warn!(site = %site.name(), error = %error, "Tag sync failed");
                    site.emit(SiteEvent::TagSyncFailed { error: error.clone() });
                }
            }
            result
        });

        if let Some(previous) = self.replace_tag_sync(task.abort_handle()) {
            if !previous.is_finished() {
                debug!(site = %self.name(), "Aborting previous tag sync");
            }
            previous.abort();
        }

        TagSyncHandle { task }
    }

    #[instrument(skip(self), fields(site = %self.name()))]
    async fn sync_tags(&self, first_page: u32, page_size: u32) -> Result<Vec<Tag>, TagSyncError> {
        let api = self
            .first_api_with(&[ApiCapability::TagListing])
            .cloned()
            .ok_or(TagSyncError::NoTagApi)?;
        let parser = api.tag_parser.ok_or(TagSyncError::NoTagApi)?;
        debug!(api = %api.name(), "Syncing tags");

        let mut state = TagSyncState::new(first_page);
        loop {
            let page = state.next_page;
            let url = api.tags_url(page, page_size).ok_or(TagSyncError::NoTagApi)?;

            let (tx, rx) = oneshot::channel();
            self.get_async(
                QueryType::List,
                &url,
                move |response| {
                    // receiver gone means the sync was aborted
                    let _ = tx.send(read_page(page, response, parser));
                },
                RequestContext::new(),
            )
            .map_err(|e| TagSyncError::InvalidUrl {
                page,
                message: e.to_string(),
            })?;

            let tags = rx.await.map_err(|_| TagSyncError::Dropped { page })??;
            debug!(page, count = tags.len(), "Tag page loaded");
            self.tag_database().insert_all(&tags);

            if !state.advance(tags, page_size)? {
                break;
            }
        }

        Ok(state.accumulated)
    }
}

// ============================================================================
// Tests
// ============================================================================
