//! In-memory tag database with optional JSON backing file.

use sitegrab_core::{Tag, TagDatabase};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{load_json, save_json, tag_cache_path};

/// Tag database held in memory.
///
/// Several sites may feed the same database concurrently. Inserting a
/// tag that is already known refreshes its count and keeps the id and
/// type when the new record lacks them.
#[derive(Debug, Default)]
pub struct InMemoryTagDatabase {
    tags: RwLock<HashMap<String, Tag>>,
    path: Option<PathBuf>,
}

impl InMemoryTagDatabase {
    /// Creates an empty database without a backing file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty database that saves to `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            tags: RwLock::default(),
            path: Some(path.into()),
        }
    }

    /// Loads the cached tags of one site from the default cache location.
    ///
    /// # Errors
    ///
    /// Returns error if the cache exists but cannot be parsed.
    pub async fn load_site(site: &str) -> Result<Self, StoreError> {
        Self::load(tag_cache_path(site)).await
    }

    /// Loads tags from `path`. A missing file yields an empty database.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db = Self::with_path(path);
        let Some(path) = db.path.as_deref() else {
            return Ok(db);
        };

        match load_json::<Vec<Tag>>(path).await {
            Ok(tags) => {
                info!(path = %path.display(), count = tags.len(), "Loaded tag cache");
                db.insert_all(&tags);
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %path.display(), "No tag cache yet");
            }
            Err(e) => return Err(e),
        }
        Ok(db)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Tag>> {
        self.tags.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Tag>> {
        self.tags.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All tags, most used first.
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.read().values().cloned().collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        tags
    }

    /// Writes every tag to the backing file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tags = self.tags();
        save_json(path, &tags).await?;
        info!(path = %path.display(), count = tags.len(), "Saved tag cache");
        Ok(())
    }
}

fn merge(tags: &mut HashMap<String, Tag>, tag: Tag) {
    match tags.get_mut(&tag.name) {
        Some(existing) => {
            existing.count = tag.count;
            existing.id = tag.id.or(existing.id);
            if tag.tag_type.is_some() {
                existing.tag_type = tag.tag_type;
            }
        }
        None => {
            tags.insert(tag.name.clone(), tag);
        }
    }
}

impl TagDatabase for InMemoryTagDatabase {
    fn insert(&self, tag: Tag) {
        merge(&mut self.write(), tag);
    }

    fn insert_all(&self, new_tags: &[Tag]) {
        // one lock for the whole page
        let mut tags = self.write();
        for tag in new_tags {
            merge(&mut tags, tag.clone());
        }
    }

    fn get(&self, name: &str) -> Option<Tag> {
        self.read().get(name).cloned()
    }

    fn len(&self) -> usize {
        self.read().len()
    }
}
