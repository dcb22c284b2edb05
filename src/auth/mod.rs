// Authentication & authorization module

pub mod audit_logger;
pub mod auth_middleware;
pub mod guard;
pub mod session;
