// Session token signing and password hashing primitives

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::core::errors::CryptoError;
use crate::core::models::{Role, UserRecord};

/// Claims embedded in a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Display identity (the user's email)
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    /// Unique per token, so two logins in the same second revoke independently
    pub jti: String,
}

impl Claims {
    pub fn for_user(user: &UserRecord, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            sub: user.id.to_string(),
            username: user.email.clone(),
            role: user.role,
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// Signature/expiry failure from the token primitive
#[derive(Debug, thiserror::Error)]
#[error("token rejected: {0}")]
pub struct TokenRejected(String);

/// HS256 signer/verifier for session tokens
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in: Duration,
}

impl TokenSigner {
    pub fn new(secret: &Secret<String>, expires_in: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; the registry relies on rejected-past-expiry tokens
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            validation,
            expires_in,
        }
    }

    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Mint a token for `user` valid for the configured window
    pub fn issue(&self, user: &UserRecord) -> Result<(String, Claims), CryptoError> {
        let claims = Claims::for_user(user, Utc::now(), self.expires_in);
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, CryptoError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| CryptoError::SigningError(e.to_string()))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims, TokenRejected> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| TokenRejected(e.to_string()))
    }
}

/// One-way password comparator
pub trait PasswordComparator: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// `false` for a mismatch and for an unparseable digest alike
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

/// Argon2id comparator producing PHC strings
#[derive(Default)]
pub struct Argon2Comparator {
    argon2: Argon2<'static>,
}

impl Argon2Comparator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PasswordComparator for Argon2Comparator {
    fn hash(&self, plaintext: &str) -> Result<String, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CryptoError::HashingError(e.to_string()))
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
