// Wiring: backends, repositories, session manager, admin seeding

use anyhow::Context;
use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::api::AppState;
use crate::auth::audit_logger::AuditLogger;
use crate::auth::session::AuthSessionManager;
use crate::config::{AdminSeed, CacheBackend, Config, TokenRegistryKind};
use crate::core::crypto::{Argon2Comparator, PasswordComparator, TokenSigner};
use crate::core::errors::AppResult;
use crate::core::models::{EntityId, Role, UserRecord};
use crate::notify::email::{EmailNotifier, LogNotifier, SmtpNotifier};
use crate::repository::pets::PetRepository;
use crate::repository::users::UserRepository;
use crate::state::cache_store::{CacheStore, MemoryCacheStore, RedisCacheStore};
use crate::state::entity_cache::EntityCache;
use crate::state::revocation::{
    CacheRevocationRegistry, InMemoryRevocationRegistry, TokenRevocationRegistry,
};
use crate::storage::memory::MemoryStore;
use crate::storage::postgres::PgStore;
use crate::storage::{PetStore, UserStore};

const MEMORY_CACHE_CAPACITY: u64 = 10_000;

/// External collaborators the application is assembled from
#[derive(Clone)]
pub struct Backends {
    pub cache_store: Arc<dyn CacheStore>,
    pub user_store: Arc<dyn UserStore>,
    pub pet_store: Arc<dyn PetStore>,
    pub notifier: Arc<dyn EmailNotifier>,
}

impl Backends {
    /// Everything in process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            cache_store: Arc::new(MemoryCacheStore::new(MEMORY_CACHE_CAPACITY)),
            user_store: store.clone(),
            pet_store: store,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Connect the backends selected by `config`
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let cache_store: Arc<dyn CacheStore> = match config.cache_backend {
            CacheBackend::Redis => Arc::new(
                RedisCacheStore::new(
                    &config.redis_url,
                    config.cache_key_prefix.clone(),
                    Duration::from_millis(config.redis_operation_timeout_ms),
                )
                .await
                .context("Failed to initialize Redis cache")?,
            ),
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new(MEMORY_CACHE_CAPACITY)),
        };
        info!(backend = ?config.cache_backend, "Cache store initialized");

        let (user_store, pet_store): (Arc<dyn UserStore>, Arc<dyn PetStore>) =
            match config.database_url {
                Some(ref database_url) => {
                    let pool = sqlx::PgPool::connect(database_url)
                        .await
                        .context("Failed to connect to database")?;
                    let store = Arc::new(PgStore::new(pool));
                    store.migrate().await.context("Failed to prepare database schema")?;
                    info!("Postgres store initialized");
                    (store.clone() as Arc<dyn UserStore>, store as Arc<dyn PetStore>)
                }
                None => {
                    let store = Arc::new(MemoryStore::new());
                    info!("DATABASE_URL not set, using in-memory store");
                    (store.clone() as Arc<dyn UserStore>, store as Arc<dyn PetStore>)
                }
            };

        let notifier: Arc<dyn EmailNotifier> = match config.email {
            Some(ref email) => {
                info!(host = %email.host, port = email.port, "SMTP notifier initialized");
                Arc::new(SmtpNotifier::new(email)?)
            }
            None => {
                info!("EMAIL_HOST not set, welcome emails will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self {
            cache_store,
            user_store,
            pet_store,
            notifier,
        })
    }
}

/// Assemble repositories, session manager and shared state
pub fn build_app_state(config: Config, backends: Backends) -> AppState {
    let cache = EntityCache::new(
        backends.cache_store,
        Duration::from_secs(config.cache_ttl_secs),
    );
    let hasher: Arc<dyn PasswordComparator> = Arc::new(Argon2Comparator::new());

    let registry: Arc<dyn TokenRevocationRegistry> = match config.token_registry {
        TokenRegistryKind::Memory => Arc::new(InMemoryRevocationRegistry::new()),
        TokenRegistryKind::Cache => Arc::new(CacheRevocationRegistry::new(cache.clone())),
    };

    let users = Arc::new(UserRepository::new(
        backends.user_store.clone(),
        cache.clone(),
        Arc::clone(&hasher),
        backends.notifier,
        config.cache_prefix_invalidation,
    ));
    let pets = Arc::new(PetRepository::new(
        backends.pet_store,
        cache.clone(),
        config.cache_prefix_invalidation,
    ));

    let signer = TokenSigner::new(
        &config.jwt_secret,
        chrono::Duration::seconds(config.jwt_expires_in_secs as i64),
    );
    let sessions = Arc::new(AuthSessionManager::new(
        Arc::clone(&users),
        signer,
        hasher,
        registry,
    ));

    AppState {
        users,
        pets,
        sessions,
        audit_logger: Arc::new(AuditLogger::new()),
        cache,
        user_store: backends.user_store,
        config: Arc::new(config),
    }
}

/// Create the configured administrator unless a user with that email exists.
///
/// Returns whether a user was created. Cached user listings are dropped so a
/// shared cache that outlived a restart does not hide the new admin.
pub async fn seed_admin(
    app_state: &AppState,
    hasher: &dyn PasswordComparator,
    seed: &AdminSeed,
) -> AppResult<bool> {
    if app_state.users.find_by_email(&seed.email).await?.is_some() {
        info!(email = %seed.email, "Admin user already exists");
        return Ok(false);
    }

    let admin = UserRecord {
        id: EntityId::new(),
        name: seed.name.clone(),
        email: seed.email.clone(),
        password_hash: hasher.hash(seed.password.expose_secret())?,
        role: Role::Admin,
    };
    let saved = app_state.user_store.insert_user(admin).await?;
    app_state
        .users
        .invalidate_user_cache(&saved.id, &saved.email)
        .await;
    info!(user_id = %saved.id, email = %saved.email, "Admin user created");
    Ok(true)
}
