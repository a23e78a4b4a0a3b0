//! API variant descriptors.
//!
//! A descriptor holds the static configuration of one backend protocol a
//! site can be queried through:
//! - Name (e.g. `Danbooru (2.0)`, `Gelbooru (0.2)`)
//! - Capability flags used for selection
//! - Tag listing URL template and page parser

use sitegrab_core::{ApiCapabilities, ApiCapability, Tag};
use sitegrab_fetch::SiteResponse;
use std::fmt;
use thiserror::Error;

/// Parses one page of a tag listing.
pub type TagParser = fn(&SiteResponse) -> Result<Vec<Tag>, ApiError>;

/// Errors raised by a backend's parser.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The body parsed but did not have the expected shape.
    #[error("Unexpected format: {0}")]
    UnexpectedFormat(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse(err.to_string())
    }
}

// ============================================================================
// Api Variant
// ============================================================================

/// Descriptor of one backend API.
#[derive(Clone)]
pub struct ApiVariant {
    /// Display name.
    pub name: String,
    /// Declared capabilities.
    pub capabilities: ApiCapabilities,
    /// Tag listing URL with `{page}` and `{limit}` placeholders.
    pub tag_url: Option<String>,
    /// Tag listing page parser.
    pub tag_parser: Option<TagParser>,
}

impl ApiVariant {
    /// Creates a new descriptor builder.
    pub fn builder(name: impl Into<String>) -> ApiVariantBuilder {
        ApiVariantBuilder::new(name)
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the variant declares `capability`.
    pub fn supports(&self, capability: ApiCapability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Returns true if the variant accepts authenticated queries.
    pub fn supports_auth(&self) -> bool {
        self.supports(ApiCapability::Authentication)
    }

    /// Tag listing URL for one page, if the variant lists tags.
    pub fn tags_url(&self, page: u32, limit: u32) -> Option<String> {
        let template = self.tag_url.as_deref()?;
        Some(
            template
                .replace("{page}", &page.to_string())
                .replace("{limit}", &limit.to_string()),
        )
    }
}

impl fmt::Debug for ApiVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiVariant")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("tag_url", &self.tag_url)
            .field("tag_parser", &self.tag_parser.is_some())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ApiVariant`].
pub struct ApiVariantBuilder {
    name: String,
    capabilities: ApiCapabilities,
    tag_url: Option<String>,
    tag_parser: Option<TagParser>,
}

impl ApiVariantBuilder {
    /// Creates a new builder for the given API name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: ApiCapabilities::new(),
            tag_url: None,
            tag_parser: None,
        }
    }

    /// Declares a capability.
    pub fn capability(mut self, capability: ApiCapability) -> Self {
        self.capabilities = self.capabilities.with(capability);
        self
    }

    /// Declares that the API accepts authenticated queries.
    pub fn authenticated(self) -> Self {
        self.capability(ApiCapability::Authentication)
    }

    /// Sets the tag listing endpoint and its parser.
    ///
    /// Also declares [`ApiCapability::TagListing`].
    pub fn tag_listing(mut self, url: impl Into<String>, parser: TagParser) -> Self {
        self.tag_url = Some(url.into());
        self.tag_parser = Some(parser);
        self.capability(ApiCapability::TagListing)
    }

    /// Builds the descriptor.
    pub fn build(self) -> ApiVariant {
        ApiVariant {
            name: self.name,
            capabilities: self.capabilities,
            tag_url: self.tag_url,
            tag_parser: self.tag_parser,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
