// Axum bearer-token authentication middleware

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::responses::ApiError;
use crate::auth::audit_logger::{AuditLogger, AuthEvent};
use crate::auth::session::AuthSessionManager;
use crate::core::errors::AppError;

/// Authentication state containing all dependencies
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<AuthSessionManager>,
    pub audit_logger: Arc<AuditLogger>,
}

/// Raw bearer token of the current request, kept for logout
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Authentication middleware function
///
/// Extracts the bearer token from `Authorization`, validates it against the
/// session manager (signature, expiry, revocation) and sets the caller's
/// `IdentityContext` and `BearerToken` in request extensions.
pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip_address = extract_ip_address(request.headers());
    let user_agent = extract_user_agent(request.headers());

    // 1. Extract token
    let Some(token) = extract_bearer_token(request.headers()) else {
        auth_state.audit_logger.log_auth_event(
            AuthEvent::TokenRejected { reason: "missing bearer token".to_string() },
            ip_address.as_deref(),
            user_agent.as_deref(),
        );
        return Err(AppError::invalid_token().into());
    };

    // 2. Validate signature, expiry and revocation
    let identity = match auth_state.sessions.validate(&token).await {
        Ok(identity) => identity,
        Err(e) => {
            auth_state.audit_logger.log_auth_event(
                AuthEvent::TokenRejected { reason: e.to_string() },
                ip_address.as_deref(),
                user_agent.as_deref(),
            );
            return Err(e.into());
        }
    };

    auth_state.audit_logger.log_auth_event(
        AuthEvent::TokenAccepted { user_id: identity.user_id },
        ip_address.as_deref(),
        user_agent.as_deref(),
    );

    // 3. Set extensions for handler
    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(BearerToken(token));

    Ok(next.run(request).await)
}

/// Extract the token from `Authorization: Bearer <token>`
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token.to_string())
    } else {
        None
    }
}

/// Extract IP address from request headers
///
/// Checks `X-Forwarded-For` first (for proxied requests), then `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .or_else(|| headers.get("X-Real-IP"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
