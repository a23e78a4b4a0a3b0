//! Notifications published by a site.

use sitegrab_core::{LoginResult, Tag};
use sitegrab_fetch::SiteResponse;
use std::sync::Arc;

use crate::tags::TagSyncError;

/// Capacity of a site's event channel.
pub const EVENT_CAPACITY: usize = 64;

/// Event broadcast to every subscriber of a [`Site`](crate::Site).
#[derive(Debug, Clone)]
pub enum SiteEvent {
    /// A login request settled. `ALREADY` and `Impossible` are not errors.
    LoggedIn {
        /// Site name.
        site: String,
        /// Outcome.
        result: LoginResult,
    },
    /// An async fetch completed, whether or not its callback ran.
    Finished(Arc<SiteResponse>),
    /// A tag sync ended normally with every tag it collected.
    FinishedLoadingTags(Vec<Tag>),
    /// A tag sync ended on an error.
    TagSyncFailed {
        /// What stopped the sync.
        error: TagSyncError,
    },
}

impl SiteEvent {
    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoggedIn { .. } => "logged_in",
            Self::Finished(_) => "finished",
            Self::FinishedLoadingTags(_) => "finished_loading_tags",
            Self::TagSyncFailed { .. } => "tag_sync_failed",
        }
    }
}
