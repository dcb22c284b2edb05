// Domain error types - classified errors with no information disclosure

use thiserror::Error;

/// Main error type surfaced by repositories and the session manager
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed identifier or missing/invalid field (HTTP 400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad credentials or an invalid/expired/revoked token (HTTP 401)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Role or ownership mismatch (HTTP 403)
    #[error("Forbidden: {0}")]
    Authorization(String),

    /// Entity absent (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique key (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Document store failure (HTTP 500)
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cryptographic error (HTTP 500)
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Cryptographic operation errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Failed to sign a session token
    #[error("Failed to sign token: {0}")]
    SigningError(String),

    /// Failed to hash a password
    #[error("Failed to hash password: {0}")]
    HashingError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::Authentication(_) => 401,
            AppError::Authorization(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::Store(_) => 500,
            AppError::Configuration(_) => 500,
            AppError::Crypto(_) => 500,
        }
    }

    /// Get user-friendly error message (no sensitive information)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(reason) => reason.clone(),
            // Every authentication failure reads the same to the caller
            AppError::Authentication(_) => "Unauthorized".to_string(),
            AppError::Authorization(reason) => reason.clone(),
            AppError::NotFound(reason) => reason.clone(),
            AppError::Conflict(reason) => reason.clone(),
            AppError::Store(_) => "Internal error".to_string(),
            AppError::Configuration(_) => "Internal error".to_string(),
            AppError::Crypto(_) => "Internal error".to_string(),
        }
    }

    /// Authentication failure for an unusable bearer token
    pub fn invalid_token() -> Self {
        AppError::Authentication("invalid or expired token".to_string())
    }

    /// Authentication failure for a token revoked by logout
    pub fn revoked_token() -> Self {
        AppError::Authentication("token has been invalidated".to_string())
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, AppError::Authentication(_))
    }
}
