// Core domain: models, errors, crypto primitives

pub mod crypto;
pub mod errors;
pub mod models;
