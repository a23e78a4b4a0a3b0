//! Tags discovered on a site.

use serde::{Deserialize, Serialize};

/// A tag as listed by a site's tag API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Site-specific tag id, when the API exposes one.
    #[serde(default)]
    pub id: Option<u64>,
    /// Tag name, normalized to the site's format.
    pub name: String,
    /// Number of posts carrying the tag.
    #[serde(default)]
    pub count: u64,
    /// Tag category (artist, character, copyright, general, ...).
    #[serde(default)]
    pub tag_type: Option<String>,
}

impl Tag {
    /// Creates a tag with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            count: 0,
            tag_type: None,
        }
    }

    /// Sets the post count.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    /// Sets the tag category.
    pub fn with_type(mut self, tag_type: impl Into<String>) -> Self {
        self.tag_type = Some(tag_type.into());
        self
    }

    /// Sets the site id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}
