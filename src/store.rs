//! The session's current base URL and its durable copy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::task::JoinHandle;

use crate::error::Result;
use crate::storage::UrlStorage;
use crate::url::{join_path, BaseUrl};

/// Sole owner of the session base URL. Session updates are synchronous;
/// persistence runs as a background task whose failures are only logged.
pub struct BaseUrlStore {
    current: RwLock<Option<BaseUrl>>,
    generation: AtomicU64,
    storage: Arc<dyn UrlStorage>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl BaseUrlStore {
    pub fn new(storage: Arc<dyn UrlStorage>) -> Self {
        BaseUrlStore {
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            storage,
            pending: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Option<BaseUrl> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current base URL as a string, empty when none has been accepted yet.
    pub fn base_url(&self) -> String {
        self.get().map(BaseUrl::into_string).unwrap_or_default()
    }

    pub fn build_url(&self, path: &str) -> String {
        join_path(&self.base_url(), path)
    }

    /// Bumped on every accepted URL.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Normalizes and accepts `url`. Fails only for URLs that do not parse.
    pub fn set(&self, url: &str, persist: bool) -> Result<BaseUrl> {
        let url = BaseUrl::parse(url)?;
        Ok(self.accept(url, persist))
    }

    pub(crate) fn accept(&self, url: BaseUrl, persist: bool) -> BaseUrl {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(url.clone());
        self.generation.fetch_add(1, Ordering::AcqRel);
        if persist {
            self.persist(&url);
        }
        url
    }

    fn persist(&self, url: &BaseUrl) {
        let storage = Arc::clone(&self.storage);
        let value = url.to_string();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            write_url(storage.as_ref(), &value);
            return;
        };
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = pending.take();
        // Chained so writes land in the order the URLs were accepted.
        *pending = Some(handle.spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            let written = tokio::task::spawn_blocking(move || write_url(storage.as_ref(), &value)).await;
            if let Err(e) = written {
                log::warn!("Base URL write task failed: {}", e);
            }
        }));
    }

    /// Waits for the most recent persistence write.
    pub async fn flush(&self) {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = pending {
            let _ = task.await;
        }
    }

    /// Reads the durable copy. Read errors and unparsable values count as absent.
    pub async fn load_persisted(&self) -> Option<BaseUrl> {
        let storage = Arc::clone(&self.storage);
        let raw = match tokio::task::spawn_blocking(move || storage.load()).await {
            Ok(Ok(raw)) => raw?,
            Ok(Err(e)) => {
                log::warn!("Could not read stored base URL: {}", e);
                return None;
            }
            Err(e) => {
                log::warn!("Base URL read task failed: {}", e);
                return None;
            }
        };
        match BaseUrl::parse(&raw) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Ignoring malformed stored base URL: {}", e);
                None
            }
        }
    }

    /// Drops the session URL and the durable copy.
    pub async fn forget(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.flush().await;
        let storage = Arc::clone(&self.storage);
        match tokio::task::spawn_blocking(move || storage.clear()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Could not clear stored base URL: {}", e),
            Err(e) => log::warn!("Base URL clear task failed: {}", e),
        }
    }
}

fn write_url(storage: &dyn UrlStorage, value: &str) {
    match storage.save(value) {
        Ok(()) => log::debug!("Persisted base URL {}", value),
        Err(e) => log::warn!("Failed to persist base URL {}: {}", value, e),
    }
}
