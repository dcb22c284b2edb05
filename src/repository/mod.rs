// Cache-aside repositories for users and pets.
//
// Reads try the cache before the store; writes invalidate only after the
// store accepted them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tracing::debug;

use crate::core::errors::AppResult;
use crate::state::entity_cache::EntityCache;

pub mod keys;
pub mod pets;
pub mod users;

/// Return the cached value under `key`, or load it and populate the cache
pub(crate) async fn read_through<T, F, Fut>(cache: &EntityCache, key: &str, load: F) -> AppResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    if let Some(cached) = cache.get::<T>(key).await {
        return Ok(cached);
    }

    let value = load().await?;
    cache.set(key, &value).await;
    Ok(value)
}

/// Drop the exact `keys`, then sweep `prefix` when enabled and the backend can
pub(crate) async fn invalidate(cache: &EntityCache, keys: &[String], prefix: &str, sweep: bool) {
    cache.invalidate(keys).await;

    if sweep && cache.supports_prefix_delete() {
        let swept = cache.delete_by_prefix(prefix).await;
        debug!(prefix = %prefix, swept, "Prefix invalidation done");
    }
}
