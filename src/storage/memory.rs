// In-memory document store for development and tests

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::models::{EntityId, Pet, PetOwner, PetRecord, Role, UpdatePet, UserRecord};
use crate::storage::{PetStore, StoreError, StoreResult, UserStore};

/// Vec-backed store preserving insertion order
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<UserRecord>>,
    pets: RwLock<Vec<PetRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn join_owner(&self, record: PetRecord) -> Pet {
        let users = self.users.read().await;
        let owner = users
            .iter()
            .find(|u| u.id == record.owner_id)
            .map(|u| PetOwner::joined(&u.to_public()))
            .unwrap_or_else(|| PetOwner::id_only(record.owner_id));
        record.into_pet(owner)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: &EntityId) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.iter().find(|u| &u.id == id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(self.users.read().await.clone())
    }

    async fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn insert_pet(&self, pet: PetRecord) -> StoreResult<PetRecord> {
        self.pets.write().await.push(pet.clone());
        Ok(pet)
    }

    async fn find_pet(&self, id: &EntityId) -> StoreResult<Option<Pet>> {
        match self.find_pet_record(id).await? {
            Some(record) => Ok(Some(self.join_owner(record).await)),
            None => Ok(None),
        }
    }

    async fn find_pet_record(&self, id: &EntityId) -> StoreResult<Option<PetRecord>> {
        Ok(self.pets.read().await.iter().find(|p| &p.id == id).cloned())
    }

    async fn list_pets(&self) -> StoreResult<Vec<Pet>> {
        let records = self.pets.read().await.clone();
        let mut pets = Vec::with_capacity(records.len());
        for record in records {
            pets.push(self.join_owner(record).await);
        }
        Ok(pets)
    }

    async fn list_pets_by_owner(&self, owner_id: &EntityId) -> StoreResult<Vec<Pet>> {
        Ok(self
            .pets
            .read()
            .await
            .iter()
            .filter(|p| &p.owner_id == owner_id)
            .cloned()
            .map(|p| {
                let owner = PetOwner::id_only(p.owner_id);
                p.into_pet(owner)
            })
            .collect())
    }

    async fn update_pet(&self, id: &EntityId, patch: &UpdatePet) -> StoreResult<Option<Pet>> {
        let updated = {
            let mut pets = self.pets.write().await;
            match pets.iter_mut().find(|p| &p.id == id) {
                Some(record) => {
                    patch.apply(record);
                    Some(record.clone())
                }
                None => None,
            }
        };
        match updated {
            Some(record) => Ok(Some(self.join_owner(record).await)),
            None => Ok(None),
        }
    }

    async fn delete_pet(&self, id: &EntityId) -> StoreResult<Option<Pet>> {
        let removed = {
            let mut pets = self.pets.write().await;
            pets.iter()
                .position(|p| &p.id == id)
                .map(|index| pets.remove(index))
        };
        match removed {
            Some(record) => Ok(Some(self.join_owner(record).await)),
            None => Ok(None),
        }
    }
}
