// Request handlers for API endpoints

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    Extension,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::responses::{ApiError, HealthResponse, MessageResponse};
use crate::api::AppState;
use crate::auth::audit_logger::AuthEvent;
use crate::auth::auth_middleware::{extract_ip_address, extract_user_agent, BearerToken};
use crate::auth::guard::{require_role, ADMIN_ONLY, ANY_ROLE};
use crate::core::errors::AppError;
use crate::core::models::{
    CreatePet, CreateUser, IdentityContext, LoginRequest, LoginResponse, Pet, PublicUser, Role,
    UpdatePet,
};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(500);

/// POST /api/auth/login
pub async fn login_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let ip_address = extract_ip_address(&headers);
    let user_agent = extract_user_agent(&headers);

    match app_state
        .sessions
        .authenticate(&request.email, &request.password)
        .await
    {
        Ok(response) => {
            app_state.audit_logger.log_auth_event(
                AuthEvent::LoginSuccess { user_id: response.user.id },
                ip_address.as_deref(),
                user_agent.as_deref(),
            );
            Ok(Json(response))
        }
        Err(e) => {
            if e.is_authentication() {
                app_state.audit_logger.log_auth_event(
                    AuthEvent::LoginFailure,
                    ip_address.as_deref(),
                    user_agent.as_deref(),
                );
            }
            Err(e.into())
        }
    }
}

/// POST /api/auth/logout
pub async fn logout_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<MessageResponse>, ApiError> {
    require_role(&identity, ANY_ROLE)?;
    app_state.sessions.logout(&identity.user_id, &token).await;
    app_state.audit_logger.log_auth_event(
        AuthEvent::Logout { user_id: identity.user_id },
        None,
        None,
    );
    Ok(Json(MessageResponse::new("Logout successful")))
}

/// POST /api/users
pub async fn create_user_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Json(payload): Json<CreateUser>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    require_role(&identity, ADMIN_ONLY)?;
    let user = app_state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}

/// GET /api/users[?role=ADMIN|CLIENT]
pub async fn list_users_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    require_role(&identity, ADMIN_ONLY)?;
    let users = match query.role {
        Some(role) => app_state.users.find_by_role(role).await?,
        None => app_state.users.find_all().await?,
    };
    Ok(Json(users))
}

/// GET /api/users/:id
pub async fn get_user_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, ApiError> {
    require_role(&identity, ADMIN_ONLY)?;
    match app_state.users.find_by_id(&id).await? {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::NotFound(format!("User with ID {} not found", id)).into()),
    }
}

/// POST /api/pets
pub async fn create_pet_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Json(payload): Json<CreatePet>,
) -> Result<(StatusCode, Json<Pet>), ApiError> {
    require_role(&identity, ANY_ROLE)?;
    let pet = app_state.pets.create(payload, &identity).await?;
    Ok((StatusCode::CREATED, Json(pet)))
}

/// GET /api/pets
pub async fn list_pets_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
) -> Result<Json<Vec<Pet>>, ApiError> {
    require_role(&identity, ANY_ROLE)?;
    let pets = app_state
        .pets
        .find_all(identity.role, &identity.user_id)
        .await?;
    Ok(Json(pets))
}

/// GET /api/pets/:id
pub async fn get_pet_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<Json<Pet>, ApiError> {
    require_role(&identity, ANY_ROLE)?;
    let pet = app_state
        .pets
        .find_one(&id, identity.role, &identity.user_id)
        .await?;
    Ok(Json(pet))
}

/// PUT /api/pets/:id
pub async fn update_pet_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
    Json(patch): Json<UpdatePet>,
) -> Result<Json<Pet>, ApiError> {
    require_role(&identity, ANY_ROLE)?;
    let pet = app_state
        .pets
        .update(&id, patch, identity.role, &identity.user_id)
        .await?;
    Ok(Json(pet))
}

/// DELETE /api/pets/:id
pub async fn delete_pet_handler(
    State(app_state): State<AppState>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<Json<Pet>, ApiError> {
    require_role(&identity, ANY_ROLE)?;
    let pet = app_state
        .pets
        .remove(&id, identity.role, &identity.user_id)
        .await?;
    Ok(Json(pet))
}

/// GET /health
///
/// Always 200; each dependency reports its own status so a slow cache
/// does not take the service out of rotation.
pub async fn health_handler(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let cache_status = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, app_state.cache.ping()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => {
            warn!("Cache ping failed");
            "disconnected".to_string()
        }
        Err(_) => {
            debug!("Cache ping timed out in health check");
            "slow: timeout".to_string()
        }
    };

    let database_status =
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, app_state.user_store.ping()).await {
            Ok(Ok(())) => "connected".to_string(),
            Ok(Err(e)) => {
                warn!(error = %e, "Store ping failed");
                "disconnected".to_string()
            }
            Err(_) => "slow: timeout".to_string(),
        };

    let status = if database_status == "connected" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        cache: cache_status,
        database: database_status,
    })
}
