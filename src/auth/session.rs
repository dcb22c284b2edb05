// Session lifecycle: credential check, token issue, validation, logout

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::crypto::{PasswordComparator, TokenSigner};
use crate::core::errors::{AppError, AppResult};
use crate::core::models::{EntityId, IdentityContext, LoginResponse, UserRecord};
use crate::repository::users::UserRepository;
use crate::state::revocation::TokenRevocationRegistry;

pub struct AuthSessionManager {
    users: Arc<UserRepository>,
    signer: TokenSigner,
    hasher: Arc<dyn PasswordComparator>,
    registry: Arc<dyn TokenRevocationRegistry>,
}

impl AuthSessionManager {
    pub fn new(
        users: Arc<UserRepository>,
        signer: TokenSigner,
        hasher: Arc<dyn PasswordComparator>,
        registry: Arc<dyn TokenRevocationRegistry>,
    ) -> Self {
        Self {
            users,
            signer,
            hasher,
            registry,
        }
    }

    /// The user when `password` matches, `None` for an unknown email or a wrong password
    pub async fn validate_user(&self, email: &str, password: &str) -> AppResult<Option<UserRecord>> {
        let Some(user) = self.users.find_by_email(email).await? else {
            debug!("Login attempt for unknown email");
            return Ok(None);
        };

        if self.hasher.verify(password, &user.password_hash) {
            Ok(Some(user))
        } else {
            debug!(user_id = %user.id, "Login attempt with wrong password");
            Ok(None)
        }
    }

    /// Issue a session token for an already-validated user
    pub fn login(&self, user: &UserRecord) -> AppResult<LoginResponse> {
        let (access_token, claims) = self.signer.issue(user)?;
        info!(user_id = %user.id, expires_at = %claims.expires_at(), "Session issued");

        Ok(LoginResponse {
            access_token,
            user: user.to_public(),
        })
    }

    /// [`validate_user`](Self::validate_user) then [`login`](Self::login); bad credentials are an authentication error
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        match self.validate_user(email, password).await? {
            Some(user) => self.login(&user),
            None => Err(AppError::Authentication("invalid credentials".to_string())),
        }
    }

    /// Resolve a bearer token into the caller's identity
    pub async fn validate(&self, token: &str) -> AppResult<IdentityContext> {
        let claims = self
            .signer
            .verify(token)
            .map_err(|_| AppError::invalid_token())?;

        if self.registry.is_revoked(token).await {
            return Err(AppError::revoked_token());
        }

        let user_id = EntityId::parse(&claims.sub).map_err(|_| AppError::invalid_token())?;
        Ok(IdentityContext {
            user_id,
            email: claims.username,
            role: claims.role,
        })
    }

    /// Revoke `token` until its natural expiry. Idempotent.
    pub async fn logout(&self, user_id: &EntityId, token: &str) {
        let expires_at = match self.signer.verify(token) {
            Ok(claims) => claims.expires_at(),
            Err(_) => Utc::now() + self.signer.expires_in(),
        };
        self.registry.revoke(token, expires_at).await;
        info!(user_id = %user_id, "Session revoked");
    }
}
