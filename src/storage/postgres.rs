// Postgres-backed document store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::core::models::{EntityId, Pet, PetOwner, PetRecord, Role, UpdatePet, UserRecord};
use crate::storage::{PetStore, StoreError, StoreResult, UserStore};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
    "CREATE TABLE IF NOT EXISTS pets (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        species TEXT,
        breed TEXT,
        age DOUBLE PRECISION,
        weight DOUBLE PRECISION,
        description TEXT,
        owner_id UUID NOT NULL REFERENCES users(id),
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS pets_owner_id_idx ON pets (owner_id)",
];

const PET_COLUMNS: &str = "p.id, p.name, p.species, p.breed, p.age, p.weight, p.description, \
     p.owner_id, p.created_at, p.updated_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| StoreError::Unexpected(format!("Unknown role '{}' in users table", row.role)))?;
        Ok(UserRecord {
            id: EntityId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
        })
    }
}

#[derive(FromRow)]
struct PetRow {
    id: Uuid,
    name: String,
    species: Option<String>,
    breed: Option<String>,
    age: Option<f64>,
    weight: Option<f64>,
    description: Option<String>,
    owner_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PetRow> for PetRecord {
    fn from(row: PetRow) -> Self {
        PetRecord {
            id: EntityId::from_uuid(row.id),
            name: row.name,
            species: row.species,
            breed: row.breed,
            age: row.age,
            weight: row.weight,
            description: row.description,
            owner_id: EntityId::from_uuid(row.owner_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Pet row with the owner's public columns from a LEFT JOIN
#[derive(FromRow)]
struct JoinedPetRow {
    #[sqlx(flatten)]
    pet: PetRow,
    owner_name: Option<String>,
    owner_email: Option<String>,
}

impl From<JoinedPetRow> for Pet {
    fn from(row: JoinedPetRow) -> Self {
        let record = PetRecord::from(row.pet);
        let owner = PetOwner {
            id: record.owner_id,
            name: row.owner_name,
            email: row.owner_email,
        };
        record.into_pet(owner)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// sqlx-backed user and pet store
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.db_pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    async fn fetch_joined(&self, filter: &str, id: Option<Uuid>) -> StoreResult<Vec<Pet>> {
        let sql = format!(
            "SELECT {}, u.name AS owner_name, u.email AS owner_email
             FROM pets p LEFT JOIN users u ON u.id = p.owner_id
             {} ORDER BY p.created_at, p.id",
            PET_COLUMNS, filter
        );
        let mut query = sqlx::query_as::<_, JoinedPetRow>(&sql);
        if let Some(id) = id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.db_pool).await?;
        Ok(rows.into_iter().map(Pet::from).collect())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: UserRecord) -> StoreResult<UserRecord> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .execute(&self.db_pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "User with email {} already exists",
                user.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn find_user_by_id(&self, id: &EntityId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, role FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.db_pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, role FROM users ORDER BY created_at, id",
        )
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(UserRecord::try_from)
        .collect()
    }

    async fn list_users_by_role(&self, role: Role) -> StoreResult<Vec<UserRecord>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, role FROM users
             WHERE role = $1 ORDER BY created_at, id",
        )
        .bind(role.as_str())
        .fetch_all(&self.db_pool)
        .await?
        .into_iter()
        .map(UserRecord::try_from)
        .collect()
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PetStore for PgStore {
    async fn insert_pet(&self, pet: PetRecord) -> StoreResult<PetRecord> {
        sqlx::query(
            "INSERT INTO pets (id, name, species, breed, age, weight, description, owner_id, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(pet.id.as_uuid())
        .bind(&pet.name)
        .bind(&pet.species)
        .bind(&pet.breed)
        .bind(pet.age)
        .bind(pet.weight)
        .bind(&pet.description)
        .bind(pet.owner_id.as_uuid())
        .bind(pet.created_at)
        .bind(pet.updated_at)
        .execute(&self.db_pool)
        .await?;
        Ok(pet)
    }

    async fn find_pet(&self, id: &EntityId) -> StoreResult<Option<Pet>> {
        let mut pets = self
            .fetch_joined("WHERE p.id = $1", Some(*id.as_uuid()))
            .await?;
        Ok(pets.pop())
    }

    async fn find_pet_record(&self, id: &EntityId) -> StoreResult<Option<PetRecord>> {
        let sql = format!("SELECT {} FROM pets p WHERE p.id = $1", PET_COLUMNS);
        let row = sqlx::query_as::<_, PetRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(PetRecord::from))
    }

    async fn list_pets(&self) -> StoreResult<Vec<Pet>> {
        self.fetch_joined("", None).await
    }

    async fn list_pets_by_owner(&self, owner_id: &EntityId) -> StoreResult<Vec<Pet>> {
        let sql = format!(
            "SELECT {} FROM pets p WHERE p.owner_id = $1 ORDER BY p.created_at, p.id",
            PET_COLUMNS
        );
        let rows = sqlx::query_as::<_, PetRow>(&sql)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let record = PetRecord::from(row);
                let owner = PetOwner::id_only(record.owner_id);
                record.into_pet(owner)
            })
            .collect())
    }

    async fn update_pet(&self, id: &EntityId, patch: &UpdatePet) -> StoreResult<Option<Pet>> {
        let updated = sqlx::query(
            "UPDATE pets SET
                name = COALESCE($2, name),
                species = COALESCE($3, species),
                breed = COALESCE($4, breed),
                age = COALESCE($5, age),
                weight = COALESCE($6, weight),
                description = COALESCE($7, description),
                updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(patch.name.as_deref().map(str::trim))
        .bind(&patch.species)
        .bind(&patch.breed)
        .bind(patch.age)
        .bind(patch.weight)
        .bind(&patch.description)
        .execute(&self.db_pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_pet(id).await
    }

    /// The joined row actually removed, in one round trip
    async fn delete_pet(&self, id: &EntityId) -> StoreResult<Option<Pet>> {
        let sql = format!(
            "WITH p AS (DELETE FROM pets WHERE id = $1 RETURNING *)
             SELECT {}, u.name AS owner_name, u.email AS owner_email
             FROM p LEFT JOIN users u ON u.id = p.owner_id",
            PET_COLUMNS
        );
        let row = sqlx::query_as::<_, JoinedPetRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(row.map(Pet::from))
    }
}
