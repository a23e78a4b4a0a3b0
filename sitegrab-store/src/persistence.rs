//! File persistence helpers.
//!
//! Settings and tag caches are small JSON documents. They are written
//! atomically and, on Unix, readable by the owner only since site settings
//! may carry credentials and session cookies.

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

const APP_DIR: &str = "sitegrab";

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - Linux: `~/.config/sitegrab`
/// - macOS: `~/Library/Application Support/sitegrab`
/// - Windows: `%APPDATA%\sitegrab`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir().map_or_else(|| PathBuf::from("."), |c| c.join(APP_DIR))
}

/// Returns the default cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir().map_or_else(|| PathBuf::from("."), |c| c.join(APP_DIR))
}

/// Returns the shared profile settings path.
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}

/// Returns the settings path for one site.
pub fn site_settings_path(site: &str) -> PathBuf {
    default_config_dir()
        .join("sites")
        .join(format!("{}.json", file_stem(site)))
}

/// Returns the tag cache path for one site.
pub fn tag_cache_path(site: &str) -> PathBuf {
    default_cache_dir()
        .join("tags")
        .join(format!("{}.json", file_stem(site)))
}

/// Maps a site name onto a safe file stem.
fn file_stem(site: &str) -> String {
    site.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

// ============================================================================
// Security: File Permissions
// ============================================================================

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(mode);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = format!("{mode:o}"), "Set permissions");
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Saves data to a JSON file with secure permissions.
///
/// Creates the parent directory if needed, writes to a temp file and
/// renames it over the target.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    set_mode(path, 0o600).await?;

    debug!(path = %path.display(), bytes = json.len(), "JSON file saved");
    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

/// Loads data from a JSON file, returning default if missing or unreadable.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path).await {
        Ok(data) => data,
        Err(e) => {
            if !e.is_not_found() {
                warn!(path = %path.display(), error = %e, "Failed to load, using defaults");
            }
            T::default()
        }
    }
}

/// Ensures a directory exists with owner-only permissions.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !tokio::fs::try_exists(path).await? {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_mode(path, 0o700).await?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
