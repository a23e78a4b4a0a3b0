//! Query classification attached to every fetch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a fetch is for.
///
/// Purely descriptive: it travels with the request so callers and log
/// output can tell fetches apart, but it never changes how the transport
/// performs the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// A listing page (search results, tag pages).
    #[default]
    List,
    /// A full-size image.
    Img,
    /// A thumbnail.
    Thumb,
    /// A detail page for a single post.
    Details,
    /// A repeated attempt of an earlier fetch.
    Retry,
}

impl QueryType {
    /// Returns the display name for this query type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::List => "List",
            Self::Img => "Image",
            Self::Thumb => "Thumbnail",
            Self::Details => "Details",
            Self::Retry => "Retry",
        }
    }

    /// Numeric code, stable across releases.
    pub fn code(&self) -> u8 {
        match self {
            Self::List => 0,
            Self::Img => 1,
            Self::Thumb => 2,
            Self::Details => 3,
            Self::Retry => 4,
        }
    }

    /// Returns true for media downloads (images and thumbnails).
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Img | Self::Thumb)
    }

    /// All query types, in code order.
    pub fn all() -> &'static [QueryType] {
        &[
            QueryType::List,
            QueryType::Img,
            QueryType::Thumb,
            QueryType::Details,
            QueryType::Retry,
        ]
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
