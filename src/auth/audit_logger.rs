// Security event logging

use tracing::{info, warn};

use crate::core::models::EntityId;

/// Authentication event type
#[derive(Debug, Clone)]
pub enum AuthEvent {
    LoginSuccess { user_id: EntityId },
    LoginFailure,
    TokenAccepted { user_id: EntityId },
    TokenRejected { reason: String },
    Logout { user_id: EntityId },
}

impl AuthEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::LoginSuccess { .. } => "LOGIN_SUCCESS",
            AuthEvent::LoginFailure => "LOGIN_FAILURE",
            AuthEvent::TokenAccepted { .. } => "TOKEN_ACCEPTED",
            AuthEvent::TokenRejected { .. } => "TOKEN_REJECTED",
            AuthEvent::Logout { .. } => "LOGOUT",
        }
    }
}

/// Audit logger for authentication events.
///
/// Events go to the structured log only; the email of a failed login is
/// never recorded.
#[derive(Debug, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_auth_event(&self, event: AuthEvent, ip_address: Option<&str>, user_agent: Option<&str>) {
        let event_type = event.event_type();
        match event {
            AuthEvent::LoginSuccess { user_id } | AuthEvent::Logout { user_id } => {
                info!(
                    event_type,
                    user_id = %user_id,
                    ip_address = ?ip_address,
                    user_agent = ?user_agent,
                    "Authentication event"
                );
            }
            AuthEvent::TokenAccepted { user_id } => {
                tracing::debug!(event_type, user_id = %user_id, "Bearer token accepted");
            }
            AuthEvent::LoginFailure => {
                warn!(
                    event_type,
                    ip_address = ?ip_address,
                    user_agent = ?user_agent,
                    "Authentication failed"
                );
            }
            AuthEvent::TokenRejected { reason } => {
                warn!(
                    event_type,
                    ip_address = ?ip_address,
                    user_agent = ?user_agent,
                    reason = %reason,
                    "Bearer token rejected"
                );
            }
        }
    }
}
