//! Ordered registry of a site's API variants.
//!
//! Selection is a pure first match in registration order. An empty result
//! is a normal answer: a site may simply have no API able to do what the
//! caller needs.

use sitegrab_core::ApiCapability;

use crate::api::ApiVariant;

// ============================================================================
// Api Registry
// ============================================================================

/// API variants of one site, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    apis: Vec<ApiVariant>,
}

impl ApiRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a variant. Earlier variants win ties.
    pub fn register(&mut self, api: ApiVariant) {
        self.apis.push(api);
    }

    /// Variants in order, only those accepting authentication if asked.
    pub fn get_apis(&self, filter_auth_only: bool) -> Vec<&ApiVariant> {
        self.apis
            .iter()
            .filter(|api| !filter_auth_only || api.supports_auth())
            .collect()
    }

    /// First registered variant.
    pub fn first_valid_api(&self) -> Option<&ApiVariant> {
        self.get_apis(false).into_iter().next()
    }

    /// First variant declaring every capability in `required`.
    pub fn first_api_with(&self, required: &[ApiCapability]) -> Option<&ApiVariant> {
        self.apis
            .iter()
            .find(|api| api.capabilities.satisfies(required))
    }

    /// Looks a variant up by name.
    pub fn get_api(&self, name: &str) -> Option<&ApiVariant> {
        self.apis.iter().find(|api| api.name == name)
    }

    /// Returns the number of registered variants.
    pub fn len(&self) -> usize {
        self.apis.len()
    }

    /// Returns true if no variant is registered.
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }

    /// Iterates the variants in order.
    pub fn iter(&self) -> impl Iterator<Item = &ApiVariant> {
        self.apis.iter()
    }
}

impl FromIterator<ApiVariant> for ApiRegistry {
    fn from_iter<I: IntoIterator<Item = ApiVariant>>(iter: I) -> Self {
        Self {
            apis: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
