// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # SiteGrab Site
//!
//! The site aggregate: one remote source reached through one of several
//! backend APIs.
//!
//! - **ApiVariant / ApiRegistry**: capability-tagged backends, first match wins
//! - **Login**: status machine driving a pluggable [`LoginCapability`]
//! - **Fetching**: URL fixing, cookie injection and async dispatch
//! - **Tag sync**: paginated tag listing into the shared tag database
//!
//! ## Usage
//!
//! ```ignore
//! use sitegrab_site::{ApiVariant, Site, SiteConfig, SiteEvent};
//! use sitegrab_core::QueryType;
//! use sitegrab_fetch::RequestContext;
//!
//! let site = Site::builder(SiteConfig::new("Danbooru", "danbooru.donmai.us"))
//!     .api(ApiVariant::builder("Danbooru (2.0)")
//!         .authenticated()
//!         .tag_listing("/tags.json?page={page}&limit={limit}", parse_tags)
//!         .build())
//!     .build()?;
//!
//! let mut events = site.subscribe();
//! site.login(false);
//! site.load_tags(1, 100);
//!
//! while let Ok(event) = events.recv().await {
//!     if let SiteEvent::FinishedLoadingTags(tags) = event {
//!         println!("{} tags", tags.len());
//!     }
//! }
//! ```

pub mod api;
pub mod error;
pub mod events;
pub mod login;
pub mod registry;
pub mod site;
pub mod tags;

pub use api::{ApiError, ApiVariant, ApiVariantBuilder, TagParser};
pub use error::SiteError;
pub use events::SiteEvent;
pub use login::{
    Credentials, LoginCapability, LoginCoordinator, LoginError, LoginSession, LoginTrigger,
};
pub use registry::ApiRegistry;
pub use site::{Site, SiteBuilder, SiteConfig, keys};
pub use tags::{TagSyncError, TagSyncHandle};
