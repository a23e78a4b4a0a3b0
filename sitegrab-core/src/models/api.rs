//! Capability flags for backend API variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Something a backend API can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCapability {
    /// Accepts authenticated queries.
    Authentication,
    /// Lists the site's tags page by page.
    TagListing,
    /// Searches posts.
    Search,
    /// Loads single post details.
    Details,
}

impl fmt::Display for ApiCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Authentication => "authentication",
            Self::TagListing => "tag listing",
            Self::Search => "search",
            Self::Details => "details",
        };
        f.write_str(label)
    }
}

/// Set of capabilities declared by an API variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiCapabilities(BTreeSet<ApiCapability>);

impl ApiCapabilities {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability.
    pub fn with(mut self, capability: ApiCapability) -> Self {
        self.0.insert(capability);
        self
    }

    /// Returns true if the capability is declared.
    pub fn contains(&self, capability: ApiCapability) -> bool {
        self.0.contains(&capability)
    }

    /// Returns true if every required capability is declared.
    pub fn satisfies(&self, required: &[ApiCapability]) -> bool {
        required.iter().all(|c| self.0.contains(c))
    }

    /// Iterates the declared capabilities.
    pub fn iter(&self) -> impl Iterator<Item = ApiCapability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ApiCapability> for ApiCapabilities {
    fn from_iter<T: IntoIterator<Item = ApiCapability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
