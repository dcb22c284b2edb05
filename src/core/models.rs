// Domain models shared by the store, cache and HTTP layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::errors::AppError;

/// Server-generated entity identifier.
///
/// Format validity is checkable independent of existence: anything that
/// does not parse as a UUID is rejected before the cache or store is touched.
/// Display always yields the canonical lowercase hyphenated form, which is
/// what ownership comparisons and cache keys are built from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied identifier, failing with a validation error
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| AppError::Validation(format!("Invalid identifier '{}'", raw)))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for EntityId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// User role. Exactly one per user.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Client => "CLIENT",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "CLIENT" => Ok(Role::Client),
            _ => Err(AppError::Validation(format!(
                "Invalid role '{}': must be ADMIN or CLIENT",
                s
            ))),
        }
    }
}

/// Stored user, including the password hash.
///
/// Deliberately not `Serialize`: only [`PublicUser`] leaves the process.
#[derive(Clone)]
pub struct UserRecord {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl UserRecord {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
        }
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<REDACTED>")
            .field("role", &self.role)
            .finish()
    }
}

/// Outward view of a user (password excluded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Payload for creating a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl CreateUser {
    pub const MIN_PASSWORD_LEN: usize = 6;

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if !is_plausible_email(&self.email) {
            return Err(AppError::Validation(format!(
                "Invalid email '{}'",
                self.email
            )));
        }
        if self.password.chars().count() < Self::MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {} characters",
                Self::MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Owner reference carried by a pet.
///
/// `name`/`email` are only present when the owner was joined on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetOwner {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl PetOwner {
    pub fn id_only(id: EntityId) -> Self {
        Self {
            id,
            name: None,
            email: None,
        }
    }

    pub fn joined(user: &PublicUser) -> Self {
        Self {
            id: user.id,
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
        }
    }
}

/// Pet as returned to callers and held in the cache.
///
/// `owner` is optional only so that a cached document missing its owner
/// deserializes instead of failing; the store always sets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<PetOwner>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pet {
    pub fn owner_id(&self) -> Option<&EntityId> {
        self.owner.as_ref().map(|o| &o.id)
    }
}

/// Stored pet row; the owner is a bare reference
#[derive(Debug, Clone, PartialEq)]
pub struct PetRecord {
    pub id: EntityId,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub age: Option<f64>,
    pub weight: Option<f64>,
    pub description: Option<String>,
    pub owner_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PetRecord {
    /// Build a new record owned by `owner_id` from a create payload
    pub fn from_create(payload: CreatePet, owner_id: EntityId) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            name: payload.name.trim().to_string(),
            species: payload.species,
            breed: payload.breed,
            age: payload.age,
            weight: payload.weight,
            description: payload.description,
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_pet(self, owner: PetOwner) -> Pet {
        Pet {
            id: self.id,
            name: self.name,
            species: self.species,
            breed: self.breed,
            age: self.age,
            weight: self.weight,
            description: self.description,
            owner: Some(owner),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Payload for creating a pet. The owner is always the caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePet {
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CreatePet {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        validate_measure("age", self.age)?;
        validate_measure("weight", self.weight)
    }
}

/// Partial update for a pet. The owner is not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePet {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdatePet {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("name must not be empty".to_string()));
            }
        }
        validate_measure("age", self.age)?;
        validate_measure("weight", self.weight)
    }

    /// Apply the patch to a stored record, bumping `updated_at`
    pub fn apply(&self, record: &mut PetRecord) {
        if let Some(name) = &self.name {
            record.name = name.trim().to_string();
        }
        if let Some(species) = &self.species {
            record.species = Some(species.clone());
        }
        if let Some(breed) = &self.breed {
            record.breed = Some(breed.clone());
        }
        if let Some(age) = self.age {
            record.age = Some(age);
        }
        if let Some(weight) = self.weight {
            record.weight = Some(weight);
        }
        if let Some(description) = &self.description {
            record.description = Some(description.clone());
        }
        record.updated_at = Utc::now();
    }
}

fn validate_measure(field: &str, value: Option<f64>) -> Result<(), AppError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(AppError::Validation(format!(
            "{} must be a number >= 0",
            field
        ))),
        _ => Ok(()),
    }
}

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    pub user_id: EntityId,
    pub email: String,
    pub role: Role,
}

/// Login payload
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Result of a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: PublicUser,
}
