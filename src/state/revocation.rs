// Token revocation registries (logout side-table)

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::state::entity_cache::EntityCache;

/// Set of tokens revoked before their natural expiry
#[async_trait]
pub trait TokenRevocationRegistry: Send + Sync {
    /// Register `token` as revoked until `expires_at`. Idempotent.
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>);

    async fn is_revoked(&self, token: &str) -> bool;
}

/// Tokens are accepted through the whole of their `exp` second, so entries
/// outlive `expires_at` by one second.
fn retained_until(expires_at: DateTime<Utc>) -> DateTime<Utc> {
    expires_at + Duration::seconds(1)
}

/// Process-local registry. Entries past expiry are pruned on each revoke.
#[derive(Default)]
pub struct InMemoryRevocationRegistry {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TokenRevocationRegistry for InMemoryRevocationRegistry {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, expiry| *expiry > now);
        entries.insert(token.to_string(), retained_until(expires_at));
    }

    async fn is_revoked(&self, token: &str) -> bool {
        // An expired entry is harmless: the signature check already rejects the token
        self.entries.read().await.contains_key(token)
    }
}

/// Registry shared across instances through the cache store.
///
/// Keys are `revoked:{sha256(token)}` so raw tokens never reach the cache.
/// A cache failure reads as "not revoked".
pub struct CacheRevocationRegistry {
    cache: EntityCache,
}

impl CacheRevocationRegistry {
    pub fn new(cache: EntityCache) -> Self {
        Self { cache }
    }

    fn key(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        format!("revoked:{}", hex::encode(digest))
    }
}

#[async_trait]
impl TokenRevocationRegistry for CacheRevocationRegistry {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) {
        let remaining = match (retained_until(expires_at) - Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => {
                debug!("Token already expired, nothing to revoke");
                return;
            }
        };
        self.cache
            .set_with_ttl(&Self::key(token), &true, remaining)
            .await;
    }

    async fn is_revoked(&self, token: &str) -> bool {
        self.cache
            .get::<bool>(&Self::key(token))
            .await
            .unwrap_or(false)
    }
}
