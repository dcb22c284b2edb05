// Document store traits and backends

use async_trait::async_trait;
use thiserror::Error;

use crate::core::errors::AppError;
use crate::core::models::{EntityId, Pet, PetRecord, Role, UpdatePet, UserRecord};

pub mod memory;
pub mod postgres;

/// Store-layer failure
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    Conflict(String),

    #[error("Store failure: {0}")]
    Unexpected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reason) => AppError::Conflict(reason),
            StoreError::Unexpected(reason) => AppError::Store(reason),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.to_string())
    }
}

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user; a duplicate email is a `Conflict`
    async fn insert_user(&self, user: UserRecord) -> StoreResult<UserRecord>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_id(&self, id: &EntityId) -> StoreResult<Option<UserRecord>>;
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
    async fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<UserRecord>>;
    async fn ping(&self) -> StoreResult<()>;
}

/// Pet persistence
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn insert_pet(&self, pet: PetRecord) -> StoreResult<PetRecord>;

    /// Single pet with the owner joined
    async fn find_pet(&self, id: &EntityId) -> StoreResult<Option<Pet>>;

    /// Stored row, owner as a bare id
    async fn find_pet_record(&self, id: &EntityId) -> StoreResult<Option<PetRecord>>;

    /// Every pet with owners joined
    async fn list_pets(&self) -> StoreResult<Vec<Pet>>;

    /// Pets of one owner, owner id only
    async fn list_pets_by_owner(&self, owner_id: &EntityId) -> StoreResult<Vec<Pet>>;

    /// Apply `patch`; `None` when the pet no longer exists
    async fn update_pet(&self, id: &EntityId, patch: &UpdatePet) -> StoreResult<Option<Pet>>;

    /// Delete and return the removed pet; `None` when it was already gone
    async fn delete_pet(&self, id: &EntityId) -> StoreResult<Option<Pet>>;
}
