// Key/value cache backends: Redis (shared) and moka (process-local)

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Cache-layer failure. Never leaves the `state` module: [`EntityCache`]
/// absorbs it and degrades to a miss or a no-op.
///
/// [`EntityCache`]: crate::state::entity_cache::EntityCache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw textual key/value store with TTL and prefix deletion
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returning how many went
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Whether `delete_by_prefix` is efficient on this backend
    fn supports_prefix_delete(&self) -> bool {
        true
    }

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Redis-backed cache, namespaced under a fixed key prefix
pub struct RedisCacheStore {
    connection_manager: ConnectionManager,
    key_prefix: String,
    operation_timeout: Duration,
}

impl RedisCacheStore {
    /// Connect to Redis, retrying with linear backoff and verifying with PING
    pub async fn new(
        redis_url: &str,
        key_prefix: impl Into<String>,
        operation_timeout: Duration,
    ) -> Result<Self, CacheError> {
        const MAX_RETRIES: u32 = 3;
        const INITIAL_DELAY_MS: u64 = 500;

        let key_prefix = key_prefix.into();
        let mut connection_errors = Vec::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(INITIAL_DELAY_MS * attempt as u64)).await;
            }

            match Self::try_create_connection(redis_url).await {
                Ok(connection_manager) => {
                    let store = Self {
                        connection_manager,
                        key_prefix: key_prefix.clone(),
                        operation_timeout,
                    };
                    match store.ping().await {
                        Ok(()) => {
                            if attempt > 0 {
                                tracing::info!("Redis connection succeeded on attempt {}", attempt + 1);
                            }
                            return Ok(store);
                        }
                        Err(e) => {
                            connection_errors.push(format!("Connection created but ping failed: {}", e));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = MAX_RETRIES,
                        error = %e,
                        "Redis connection attempt failed, retrying..."
                    );
                    connection_errors.push(format!("Attempt {} failed: {}", attempt + 1, e));
                }
            }
        }

        Err(CacheError::Connection(format!(
            "Failed to connect to Redis at {} after {} attempts: {}",
            redis_url,
            MAX_RETRIES,
            connection_errors.join("; ")
        )))
    }

    async fn try_create_connection(redis_url: &str) -> Result<ConnectionManager, CacheError> {
        let client = Client::open(redis_url).map_err(|e| {
            CacheError::Connection(format!("Invalid Redis URL format '{}': {}", redis_url, e))
        })?;

        tokio::time::timeout(Duration::from_secs(10), ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::Timeout(Duration::from_secs(10)))?
            .map_err(|e| CacheError::Connection(format!("Failed to create ConnectionManager: {}", e)))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, op).await {
            Ok(result) => result.map_err(|e| CacheError::Connection(e.to_string())),
            Err(_) => Err(CacheError::Timeout(self.operation_timeout)),
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection_manager.clone();
        let key = self.namespaced(key);
        self.bounded(async move { conn.get::<_, Option<String>>(&key).await })
            .await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection_manager.clone();
        let namespaced = self.namespaced(key);
        let seconds = expiry_seconds(ttl);
        self.bounded(async move { conn.set_ex::<_, _, ()>(&namespaced, value, seconds).await })
            .await?;
        tracing::debug!(key = %key, ttl_secs = seconds, "Cache entry stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection_manager.clone();
        let key = self.namespaced(key);
        self.bounded(async move { conn.del::<_, ()>(&key).await }).await
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", escape_glob(&self.namespaced(prefix)));
        let mut conn = self.connection_manager.clone();
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        // SCAN rather than KEYS so a large keyspace never blocks the server
        loop {
            let mut scan = redis::cmd("SCAN");
            scan.arg(cursor).arg("MATCH").arg(&pattern).arg("COUNT").arg(100);
            let mut scan_conn = conn.clone();
            let (next, keys): (u64, Vec<String>) = self
                .bounded(async move { scan.query_async(&mut scan_conn).await })
                .await?;

            if !keys.is_empty() {
                let removed: u64 = self
                    .bounded(async { conn.del::<_, u64>(&keys).await })
                    .await?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        if deleted > 0 {
            tracing::info!(pattern = %pattern, deleted, "Deleted cache keys by prefix");
        } else {
            tracing::debug!(pattern = %pattern, "No cache keys matched prefix");
        }
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection_manager.clone();
        let result: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;

        if result == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Connection(format!(
                "Redis ping returned unexpected response: {}",
                result
            )))
        }
    }
}

/// Escape Redis glob metacharacters so a prefix matches literally
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, MemoryEntry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &MemoryEntry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MemoryEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local cache for single-instance deployments and tests
pub struct MemoryCacheStore {
    cache: Cache<String, MemoryEntry>,
}

impl MemoryCacheStore {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { cache }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), MemoryEntry { value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let matching: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();

        for key in &matching {
            self.cache.invalidate(key).await;
        }
        Ok(matching.len() as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Whole seconds for `SET EX`, rounded up so an entry never expires early
fn expiry_seconds(ttl: Duration) -> u64 {
    let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    seconds.max(1)
}
