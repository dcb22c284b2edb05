// Configuration management

use crate::core::errors::AppError;
use secrecy::Secret;
use std::env;
use std::str::FromStr;

/// Which cache backend holds entity and revocation entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl FromStr for CacheBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(CacheBackend::Redis),
            "memory" => Ok(CacheBackend::Memory),
            other => Err(AppError::Configuration(format!(
                "Invalid CACHE_BACKEND '{}': must be 'redis' or 'memory'",
                other
            ))),
        }
    }
}

/// Where revoked tokens are tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRegistryKind {
    /// Process-local; revocations are lost on restart
    Memory,
    /// Shared through the cache backend
    Cache,
}

impl FromStr for TokenRegistryKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(TokenRegistryKind::Memory),
            "cache" => Ok(TokenRegistryKind::Cache),
            other => Err(AppError::Configuration(format!(
                "Invalid TOKEN_REGISTRY '{}': must be 'memory' or 'cache'",
                other
            ))),
        }
    }
}

/// SMTP settings; present only when `EMAIL_HOST` is set
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<Secret<String>>,
    pub from: String,
    pub client_url: String,
}

/// Initial administrator created at startup when absent
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: Secret<String>,
}

/// Application configuration loaded from environment variables
///
/// All configuration is validated on load with clear error messages.
#[derive(Debug, Clone)]
pub struct Config {
    // Server configuration
    pub bind_address: String,
    pub port: u16,

    // Cache configuration
    pub cache_backend: CacheBackend,
    pub redis_url: String,
    pub cache_ttl_secs: u64,
    pub cache_key_prefix: String,
    pub cache_prefix_invalidation: bool,
    pub redis_operation_timeout_ms: u64,

    // Database configuration (optional; in-memory store when absent)
    pub database_url: Option<String>,

    // Session configuration
    pub jwt_secret: Secret<String>,
    pub jwt_expires_in_secs: u64,
    pub token_registry: TokenRegistryKind,

    // Middleware configuration
    pub request_timeout_secs: u64,
    pub body_size_limit_bytes: usize,

    // Collaborators
    pub email: Option<EmailConfig>,
    pub admin_seed: Option<AdminSeed>,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    pub fn from_env() -> Result<Self, AppError> {
        // Skip in test environment to avoid interfering with test environment variables
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok(); // Ignore errors (file may not exist)
        }

        let config = Self {
            bind_address: Self::get_env_or_default("BIND_ADDRESS", "0.0.0.0"),
            port: Self::parse_port()?,
            cache_backend: Self::get_env_or_default("CACHE_BACKEND", "redis").parse()?,
            redis_url: Self::get_env_or_default("REDIS_URL", "redis://localhost:6379/0"),
            cache_ttl_secs: Self::parse_u64_or_default("CACHE_TTL_SECS", 300)?,
            cache_key_prefix: Self::get_env_or_default("CACHE_KEY_PREFIX", "pet_club:"),
            cache_prefix_invalidation: Self::parse_bool_or_default("CACHE_PREFIX_INVALIDATION", true)?,
            redis_operation_timeout_ms: Self::parse_u64_or_default("REDIS_OPERATION_TIMEOUT_MS", 500)?,
            database_url: Self::get_optional_env("DATABASE_URL"),
            jwt_secret: Secret::new(Self::get_required_env("JWT_SECRET")?),
            jwt_expires_in_secs: Self::parse_u64_or_default("JWT_EXPIRES_IN_SECS", 3600)?,
            token_registry: Self::get_env_or_default("TOKEN_REGISTRY", "memory").parse()?,
            request_timeout_secs: Self::parse_u64_or_default("REQUEST_TIMEOUT_SECS", 30)?,
            body_size_limit_bytes: Self::parse_usize_or_default("BODY_SIZE_LIMIT_BYTES", 1024 * 1024)?,
            email: Self::load_email()?,
            admin_seed: Self::load_admin_seed(),
            log_level: Self::get_env_or_default("LOG_LEVEL", "info"),
            log_format: Self::get_env_or_default("LOG_FORMAT", "json"),
        };

        // Post-load validation
        config.validate()?;

        Ok(config)
    }

    /// Get environment variable or return default value
    fn get_env_or_default(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get optional environment variable; empty counts as unset
    fn get_optional_env(key: &str) -> Option<String> {
        match env::var(key) {
            Ok(value) if !value.is_empty() => Some(value),
            _ => None,
        }
    }

    fn get_required_env(key: &str) -> Result<String, AppError> {
        Self::get_optional_env(key)
            .ok_or_else(|| AppError::Configuration(format!("{} not set", key)))
    }

    /// Parse port from PORT environment variable
    fn parse_port() -> Result<u16, AppError> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3333".to_string());
        let port = port_str.parse::<u16>().map_err(|e| {
            AppError::Configuration(format!("Invalid PORT value '{}': {}", port_str, e))
        })?;

        if port == 0 {
            return Err(AppError::Configuration(
                "PORT must be between 1 and 65535".to_string(),
            ));
        }

        Ok(port)
    }

    /// Parse a positive u64 from environment variable or return default
    fn parse_u64_or_default(key: &str, default: u64) -> Result<u64, AppError> {
        match env::var(key) {
            Ok(value) => Self::parse_positive(key, &value),
            _ => Ok(default),
        }
    }

    /// Parse a positive usize from environment variable or return default
    fn parse_usize_or_default(key: &str, default: usize) -> Result<usize, AppError> {
        match env::var(key) {
            Ok(value) => Self::parse_positive(key, &value),
            _ => Ok(default),
        }
    }

    fn parse_positive<T>(key: &str, value: &str) -> Result<T, AppError>
    where
        T: FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        let parsed = value.parse::<T>().map_err(|e| {
            AppError::Configuration(format!("Invalid {} value '{}': {}", key, value, e))
        })?;

        if parsed == T::default() {
            return Err(AppError::Configuration(format!(
                "{} must be greater than 0",
                key
            )));
        }

        Ok(parsed)
    }

    fn parse_bool_or_default(key: &str, default: bool) -> Result<bool, AppError> {
        match env::var(key) {
            Ok(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(AppError::Configuration(format!(
                    "Invalid {} value '{}': expected true or false",
                    key, value
                ))),
            },
            _ => Ok(default),
        }
    }

    fn load_email() -> Result<Option<EmailConfig>, AppError> {
        let Some(host) = Self::get_optional_env("EMAIL_HOST") else {
            return Ok(None);
        };

        let port = match env::var("EMAIL_PORT") {
            Ok(value) => Self::parse_positive::<u16>("EMAIL_PORT", &value)?,
            _ => 587,
        };

        Ok(Some(EmailConfig {
            host,
            port,
            user: Self::get_optional_env("EMAIL_USER"),
            pass: Self::get_optional_env("EMAIL_PASS").map(Secret::new),
            from: Self::get_required_env("EMAIL_FROM")?,
            client_url: Self::get_env_or_default("CLIENT_URL", "http://localhost:3000"),
        }))
    }

    fn load_admin_seed() -> Option<AdminSeed> {
        Some(AdminSeed {
            name: Self::get_optional_env("ADMIN_NAME")?,
            email: Self::get_optional_env("ADMIN_EMAIL")?,
            password: Secret::new(Self::get_optional_env("ADMIN_PASSWORD")?),
        })
    }

    /// Validate all configuration values
    fn validate(&self) -> Result<(), AppError> {
        if self.cache_backend == CacheBackend::Redis {
            Self::validate_url(&self.redis_url, "Redis URL")?;
        }
        if let Some(ref url) = self.database_url {
            Self::validate_url(url, "Database URL")?;
        }
        if let Some(ref email) = self.email {
            Self::validate_url(&email.client_url, "Client URL")?;
        }

        if self.cache_key_prefix.is_empty() {
            return Err(AppError::Configuration(
                "CACHE_KEY_PREFIX must not be empty".to_string(),
            ));
        }

        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;

        Ok(())
    }

    /// Validate URL format
    fn validate_url(url: &str, description: &str) -> Result<(), AppError> {
        url::Url::parse(url).map_err(|e| {
            AppError::Configuration(format!("Invalid {} '{}': {}", description, url, e))
        })?;
        Ok(())
    }

    /// Validate log level
    fn validate_log_level(level: &str) -> Result<(), AppError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(AppError::Configuration(format!(
                "Invalid LOG_LEVEL '{}': must be one of {}",
                level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Validate log format
    fn validate_log_format(format: &str) -> Result<(), AppError> {
        if format != "json" && format != "text" {
            return Err(AppError::Configuration(format!(
                "Invalid LOG_FORMAT '{}': must be 'json' or 'text'",
                format
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Create a test configuration
    ///
    /// Bypasses environment loading; uses the in-memory cache, store and
    /// revocation registry.
    pub fn test_config() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 3333,
            cache_backend: CacheBackend::Memory,
            redis_url: "redis://localhost:6379/0".to_string(),
            cache_ttl_secs: 300,
            cache_key_prefix: "pet_club:".to_string(),
            cache_prefix_invalidation: true,
            redis_operation_timeout_ms: 500,
            database_url: None,
            jwt_secret: Secret::new("test-jwt-secret".to_string()),
            jwt_expires_in_secs: 3600,
            token_registry: TokenRegistryKind::Memory,
            request_timeout_secs: 30,
            body_size_limit_bytes: 1024 * 1024,
            email: None,
            admin_seed: None,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
        }
    }
}
