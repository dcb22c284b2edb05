// Best-effort typed cache over a CacheStore

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::state::cache_store::{CacheError, CacheStore};

/// JSON-typed view over a [`CacheStore`].
///
/// Every cache failure is logged and absorbed: reads degrade to a miss,
/// writes and deletes degrade to a no-op. Callers never see a `CacheError`.
#[derive(Clone)]
pub struct EntityCache {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl EntityCache {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn supports_prefix_delete(&self) -> bool {
        self.store.supports_prefix_delete()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    pub async fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let result = match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, raw, ttl).await,
            Err(e) => Err(CacheError::from(e)),
        };
        if let Err(e) = result {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key = %key, error = %e, "Cache delete failed");
        }
    }

    /// Returns the number of deleted keys, 0 on failure
    pub async fn delete_by_prefix(&self, prefix: &str) -> u64 {
        match self.store.delete_by_prefix(prefix).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Cache prefix delete failed");
                0
            }
        }
    }

    /// Delete each key; a failure on one does not stop the rest
    pub async fn invalidate(&self, keys: &[String]) {
        for key in keys {
            self.delete(key).await;
        }
    }

    pub async fn ping(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
