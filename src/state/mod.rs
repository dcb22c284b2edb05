// Shared runtime state: cache backends and the token revocation side-table

pub mod cache_store;
pub mod entity_cache;
pub mod revocation;
