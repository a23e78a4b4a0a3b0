// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # SiteGrab Store
//!
//! Settings storage and tag database for SiteGrab.
//!
//! This crate provides:
//!
//! - **SettingsStore**: key/value preferences with persistence and watch notifications
//! - **MixedSettings**: a site layer over the shared profile layer
//! - **InMemoryTagDatabase**: tags collected by tag sync, cached as JSON
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sitegrab_store::{MixedSettings, SettingsStore};
//!
//! let profile = Arc::new(SettingsStore::load_default().await?);
//! let site = Arc::new(SettingsStore::load_site("danbooru").await?);
//! let settings = MixedSettings::new(vec![site, profile])?;
//!
//! let ssl = settings.get("ssl", true);
//! settings.set("login/auto_login", &false, &true)?;
//! settings.sync().await?;
//! ```

pub mod error;
pub mod persistence;
pub mod settings_store;
pub mod tag_database;

pub use error::StoreError;
pub use persistence::{
    default_cache_dir, default_config_dir, default_settings_path, ensure_dir, load_json,
    load_json_or_default, save_json, site_settings_path, tag_cache_path,
};
pub use settings_store::{MixedSettings, SettingsStore};
pub use tag_database::InMemoryTagDatabase;
