// User repository: creation, cached lookups, credential lookup

use std::sync::Arc;
use tracing::{info, warn};

use crate::core::crypto::PasswordComparator;
use crate::core::errors::{AppError, AppResult};
use crate::core::models::{CreateUser, EntityId, PublicUser, Role, UserRecord};
use crate::notify::email::EmailNotifier;
use crate::repository::{invalidate, keys, read_through};
use crate::state::entity_cache::EntityCache;
use crate::storage::UserStore;

pub struct UserRepository {
    store: Arc<dyn UserStore>,
    cache: EntityCache,
    hasher: Arc<dyn PasswordComparator>,
    notifier: Arc<dyn EmailNotifier>,
    prefix_invalidation: bool,
}

impl UserRepository {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache: EntityCache,
        hasher: Arc<dyn PasswordComparator>,
        notifier: Arc<dyn EmailNotifier>,
        prefix_invalidation: bool,
    ) -> Self {
        Self {
            store,
            cache,
            hasher,
            notifier,
            prefix_invalidation,
        }
    }

    /// Create a user and mail them their credentials.
    ///
    /// A duplicate email is a `Conflict`. A failed welcome email is logged
    /// and does not fail the creation.
    pub async fn create(&self, payload: CreateUser) -> AppResult<PublicUser> {
        payload.validate()?;
        let email = payload.email.trim().to_string();

        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(conflict(&email));
        }

        let record = UserRecord {
            id: EntityId::new(),
            name: payload.name.trim().to_string(),
            email,
            password_hash: self.hasher.hash(&payload.password)?,
            role: payload.role,
        };
        let saved = self.store.insert_user(record).await?;

        if !self
            .notifier
            .send_welcome(&saved.email, &saved.name, &payload.password)
            .await
        {
            warn!(user_id = %saved.id, "Welcome email could not be delivered");
        }

        self.invalidate_user_cache(&saved.id, &saved.email).await;
        info!(user_id = %saved.id, role = %saved.role, "User created");

        Ok(saved.to_public())
    }

    pub async fn find_all(&self) -> AppResult<Vec<PublicUser>> {
        read_through(&self.cache, &keys::users_all(), || async {
            self.store
                .list_users()
                .await
                .map(|users| users.iter().map(UserRecord::to_public).collect::<Vec<_>>())
                .map_err(AppError::from)
        })
        .await
    }

    /// `None` when no user has this id; a malformed id is a validation error
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<PublicUser>> {
        let id = EntityId::parse(id)?;
        let key = keys::user(&id);

        if let Some(cached) = self.cache.get::<PublicUser>(&key).await {
            return Ok(Some(cached));
        }

        let user = self.store.find_user_by_id(&id).await?.map(|u| u.to_public());
        if let Some(ref user) = user {
            self.cache.set(&key, user).await;
        }
        Ok(user)
    }

    pub async fn find_by_role(&self, role: Role) -> AppResult<Vec<PublicUser>> {
        read_through(&self.cache, &keys::users_by_role(role), || async {
            self.store
                .list_users_by_role(role)
                .await
                .map(|users| users.iter().map(UserRecord::to_public).collect::<Vec<_>>())
                .map_err(AppError::from)
        })
        .await
    }

    /// Full record including the password hash. Never cached.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.store.find_user_by_email(email.trim()).await?)
    }

    /// Drop every cached view a change to this user could affect
    pub async fn invalidate_user_cache(&self, id: &EntityId, email: &str) {
        let exact = [
            keys::user(id),
            keys::users_all(),
            keys::users_by_role(Role::Admin),
            keys::users_by_role(Role::Client),
        ];
        invalidate(&self.cache, &exact, keys::USERS_PREFIX, self.prefix_invalidation).await;
        tracing::debug!(user_id = %id, email = %email, "User cache invalidated");
    }
}

fn conflict(email: &str) -> AppError {
    AppError::Conflict(format!("User with email {} already exists", email))
}
