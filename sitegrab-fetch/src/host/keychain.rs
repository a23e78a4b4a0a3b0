//! Site credentials in the platform keychain.
//!
//! Passwords and API keys are looked up by `(service, account)`, where the
//! service is the site name and the account is the credential field. The
//! system backend prefixes services with `sitegrab:` so entries from other
//! programs are never touched.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, trace};

use crate::error::KeychainError;

const SERVICE_PREFIX: &str = "sitegrab";

// ============================================================================
// Keychain API Trait
// ============================================================================

/// Secret storage keyed by site and credential field.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Reads a secret. `Ok(None)` means nothing is stored.
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;

    /// Stores or replaces a secret.
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError>;

    /// Removes a secret. Removing a missing secret succeeds.
    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError>;

    /// Returns true if a secret is stored; lookup errors count as absent.
    async fn exists(&self, service: &str, account: &str) -> bool {
        matches!(self.get(service, account).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain
// ============================================================================

/// Platform keychain through `keyring`.
///
/// `keyring` calls block (and may prompt the user), so each one runs on
/// the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a handle to the platform keychain.
    pub fn new() -> Self {
        Self
    }

    fn full_service(service: &str) -> String {
        format!("{SERVICE_PREFIX}:{service}")
    }

    async fn with_entry<T, F>(service: &str, account: &str, op: F) -> Result<T, KeychainError>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T, keyring::Error> + Send + 'static,
    {
        let service = Self::full_service(service);
        let account = account.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &account).map_err(|e| KeychainError::Platform(e.to_string()))?;
            op(entry).map_err(KeychainError::from)
        })
        .await
        .map_err(|e| KeychainError::Other(e.to_string()))?
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        trace!(service, account, "Keychain lookup");
        let secret = Self::with_entry(service, account, |entry| match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e),
        })
        .await?;
        debug!(service, account, found = secret.is_some(), "Keychain lookup done");
        Ok(secret)
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        let secret = secret.to_string();
        Self::with_entry(service, account, move |entry| entry.set_password(&secret)).await?;
        debug!(service, account, "Stored credential");
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        Self::with_entry(service, account, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e),
        })
        .await?;
        debug!(service, account, "Deleted credential");
        Ok(())
    }
}

// ============================================================================
// In-Memory Keychain
// ============================================================================

/// Keychain kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryKeychain {
    /// Creates an empty keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    pub fn with_entry(self, service: &str, account: &str, secret: &str) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
        self
    }
}

#[async_trait]
impl KeychainApi for MemoryKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

/// Common account names for site credentials.
pub mod accounts {
    /// Login name.
    pub const USERNAME: &str = "username";
    /// Password.
    pub const PASSWORD: &str = "password";
    /// API key.
    pub const API_KEY: &str = "api_key";
}

// ============================================================================
// Tests
// ============================================================================
