// Role guards and the ownership predicate

use crate::core::errors::{AppError, AppResult};
use crate::core::models::{EntityId, IdentityContext, Role};

pub const ADMIN_ONLY: &[Role] = &[Role::Admin];
pub const ANY_ROLE: &[Role] = &[Role::Admin, Role::Client];

/// Fail with an authorization error unless the caller holds one of `allowed`
pub fn require_role(identity: &IdentityContext, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "Role {} is not allowed to perform this operation",
            identity.role
        )))
    }
}

/// Whether `caller_id` with `role` may touch an entity owned by `owner`.
///
/// ADMIN always may. Anyone else must be the owner; an entity without an
/// owner reference is denied.
pub fn can_access(owner: Option<&EntityId>, role: Role, caller_id: &EntityId) -> bool {
    if role.is_admin() {
        return true;
    }
    match owner {
        Some(owner_id) => owner_id.to_string() == caller_id.to_string(),
        None => false,
    }
}

/// [`can_access`] as a `Result`
pub fn ensure_access(owner: Option<&EntityId>, role: Role, caller_id: &EntityId, entity: &str) -> AppResult<()> {
    if can_access(owner, role, caller_id) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "You do not have permission to access this {}",
            entity
        )))
    }
}
