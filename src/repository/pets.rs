// Pet repository with owner/role authorization

use std::sync::Arc;
use tracing::info;

use crate::auth::guard::ensure_access;
use crate::core::errors::{AppError, AppResult};
use crate::core::models::{
    CreatePet, EntityId, IdentityContext, Pet, PetOwner, PetRecord, Role, UpdatePet,
};
use crate::repository::{invalidate, keys, read_through};
use crate::state::entity_cache::EntityCache;
use crate::storage::PetStore;

const ENTITY: &str = "pet";

pub struct PetRepository {
    store: Arc<dyn PetStore>,
    cache: EntityCache,
    prefix_invalidation: bool,
}

impl PetRepository {
    pub fn new(store: Arc<dyn PetStore>, cache: EntityCache, prefix_invalidation: bool) -> Self {
        Self {
            store,
            cache,
            prefix_invalidation,
        }
    }

    /// Persist a pet owned by the caller
    pub async fn create(&self, payload: CreatePet, caller: &IdentityContext) -> AppResult<Pet> {
        payload.validate()?;

        let record = PetRecord::from_create(payload, caller.user_id);
        let saved = self.store.insert_pet(record).await?;
        let owner_id = saved.owner_id;

        self.invalidate_for(&saved.id, &owner_id).await;
        info!(pet_id = %saved.id, owner_id = %owner_id, "Pet created");

        Ok(saved.into_pet(PetOwner::id_only(owner_id)))
    }

    /// Every pet for ADMIN, the caller's own pets otherwise
    pub async fn find_all(&self, role: Role, caller_id: &EntityId) -> AppResult<Vec<Pet>> {
        if role.is_admin() {
            read_through(&self.cache, &keys::pets_all(), || async {
                self.store.list_pets().await.map_err(AppError::from)
            })
            .await
        } else {
            read_through(&self.cache, &keys::pets_by_owner(caller_id), || async {
                self.store.list_pets_by_owner(caller_id).await.map_err(AppError::from)
            })
            .await
        }
    }

    pub async fn find_one(&self, id: &str, role: Role, caller_id: &EntityId) -> AppResult<Pet> {
        let id = EntityId::parse(id)?;
        let key = keys::pet(&id);

        if let Some(cached) = self.cache.get::<Pet>(&key).await {
            ensure_access(cached.owner_id(), role, caller_id, ENTITY)?;
            return Ok(cached);
        }

        let pet = self
            .store
            .find_pet(&id)
            .await?
            .ok_or_else(|| not_found(&id))?;
        ensure_access(pet.owner_id(), role, caller_id, ENTITY)?;

        self.cache.set(&key, &pet).await;
        Ok(pet)
    }

    pub async fn update(
        &self,
        id: &str,
        patch: UpdatePet,
        role: Role,
        caller_id: &EntityId,
    ) -> AppResult<Pet> {
        let id = EntityId::parse(id)?;
        patch.validate()?;

        let current = self.load_authorized(&id, role, caller_id).await?;
        let updated = self
            .store
            .update_pet(&id, &patch)
            .await?
            .ok_or_else(|| not_found(&id))?;

        self.invalidate_for(&id, &current.owner_id).await;
        info!(pet_id = %id, "Pet updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: &str, role: Role, caller_id: &EntityId) -> AppResult<Pet> {
        let id = EntityId::parse(id)?;

        let current = self.load_authorized(&id, role, caller_id).await?;
        let removed = self
            .store
            .delete_pet(&id)
            .await?
            .ok_or_else(|| not_found(&id))?;

        self.invalidate_for(&id, &current.owner_id).await;
        info!(pet_id = %id, "Pet removed");
        Ok(removed)
    }

    /// Load straight from the store (never the cache) and authorize
    async fn load_authorized(&self, id: &EntityId, role: Role, caller_id: &EntityId) -> AppResult<PetRecord> {
        let record = self
            .store
            .find_pet_record(id)
            .await?
            .ok_or_else(|| not_found(id))?;
        ensure_access(Some(&record.owner_id), role, caller_id, ENTITY)?;
        Ok(record)
    }

    async fn invalidate_for(&self, id: &EntityId, owner_id: &EntityId) {
        let exact = [keys::pet(id), keys::pets_all(), keys::pets_by_owner(owner_id)];
        invalidate(&self.cache, &exact, keys::PETS_PREFIX, self.prefix_invalidation).await;
    }
}

fn not_found(id: &EntityId) -> AppError {
    AppError::NotFound(format!("Pet with ID {} not found", id))
}
