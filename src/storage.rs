//! Durable storage for the last working base URL. The keyring backend keeps it in
//! the platform's secure store under a single key, plain text.

use std::sync::{Mutex, PoisonError};

use crate::config::ENV_CONFIG_DIR;
use crate::error::{DiscoveryError, Result};

const SERVICE_NAME: &str = "DrinkMaster";
pub const KEY_BASE_URL: &str = "drinkmaster_api_base_url";

pub trait UrlStorage: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, url: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

fn service_name() -> &'static str {
    if std::env::var(ENV_CONFIG_DIR).map(|s| !s.trim().is_empty()).unwrap_or(false) {
        "DrinkMaster-E2E"
    } else {
        SERVICE_NAME
    }
}

fn storage_err(e: keyring::Error) -> DiscoveryError {
    DiscoveryError::Storage(e.to_string())
}

pub struct KeyringStorage {
    service: String,
}

impl KeyringStorage {
    pub fn new() -> Self {
        KeyringStorage::with_service(service_name())
    }

    pub fn with_service(service: &str) -> Self {
        KeyringStorage {
            service: service.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, KEY_BASE_URL).map_err(storage_err)
    }
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlStorage for KeyringStorage {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(s) if !s.trim().is_empty() => Ok(Some(s)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn save(&self, url: &str) -> Result<()> {
        self.entry()?.set_password(url).map_err(storage_err)
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }
}

/// Process-local storage, for tests and shells without a secure store.
#[derive(Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(url: &str) -> Self {
        MemoryStorage {
            value: Mutex::new(Some(url.to_string())),
        }
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl UrlStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.value())
    }

    fn save(&self, url: &str) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(url.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
