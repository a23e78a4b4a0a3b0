//! Trait definitions for SiteGrab.
//!
//! This module defines the collaborators a site writes into but does not own.

use crate::models::Tag;

/// Sink for tags discovered while syncing a site.
///
/// Implementations are shared between sites (behind an `Arc`) and must
/// tolerate interleaved writes from several of them.
pub trait TagDatabase: Send + Sync {
    /// Inserts or replaces a tag, keyed by name.
    fn insert(&self, tag: Tag);

    /// Inserts a batch of tags.
    fn insert_all(&self, tags: &[Tag]) {
        for tag in tags {
            self.insert(tag.clone());
        }
    }

    /// Looks a tag up by name.
    fn get(&self, name: &str) -> Option<Tag>;

    /// Number of known tags.
    fn len(&self) -> usize;

    /// Returns true if no tag is known.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
