// Cache key layout. Keys are relative to the cache store's namespace prefix.

use crate::core::models::{EntityId, Role};

pub const PETS_PREFIX: &str = "pets:";
pub const USERS_PREFIX: &str = "users:";

pub fn pets_all() -> String {
    "pets:all".to_string()
}

pub fn pets_by_owner(owner_id: &EntityId) -> String {
    format!("pets:user:{}", owner_id)
}

pub fn pet(id: &EntityId) -> String {
    format!("pet:{}", id)
}

pub fn users_all() -> String {
    "users:all".to_string()
}

pub fn users_by_role(role: Role) -> String {
    format!("users:role:{}", role.as_str())
}

pub fn user(id: &EntityId) -> String {
    format!("user:id:{}", id)
}
