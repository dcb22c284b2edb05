// Axum web server layer

use axum::{
    error_handling::HandleErrorLayer,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;

pub mod handlers;
pub mod middleware;
pub mod responses;

use crate::auth::audit_logger::AuditLogger;
use crate::auth::auth_middleware::{auth_middleware, AuthState};
use crate::auth::session::AuthSessionManager;
use crate::repository::pets::PetRepository;
use crate::repository::users::UserRepository;
use crate::state::entity_cache::EntityCache;
use crate::storage::UserStore;

pub use crate::config::Config;

/// Application state containing all shared dependencies
///
/// All components are wrapped in Arc for shared ownership across async tasks.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserRepository>,
    pub pets: Arc<PetRepository>,
    pub sessions: Arc<AuthSessionManager>,
    pub audit_logger: Arc<AuditLogger>,
    /// Cache handle, used for health reporting
    pub cache: EntityCache,
    /// Store handle, used for health reporting
    pub user_store: Arc<dyn UserStore>,
    pub config: Arc<Config>,
}

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Tracing (tower-http::trace)
/// - CORS
/// - Request timeout (tower::timeout) with a JSON error mapping
/// - Body size limit (tower-http::limit)
/// - Bearer auth, on protected routes only
///
/// `/health` and `/api/auth/login` bypass auth.
pub fn create_router(app_state: &AppState) -> Router<AppState> {
    let auth_state = Arc::new(AuthState {
        sessions: Arc::clone(&app_state.sessions),
        audit_logger: Arc::clone(&app_state.audit_logger),
    });

    let protected = Router::new()
        .route("/auth/logout", post(handlers::logout_handler))
        .route(
            "/users",
            post(handlers::create_user_handler).get(handlers::list_users_handler),
        )
        .route("/users/:id", get(handlers::get_user_handler))
        .route(
            "/pets",
            post(handlers::create_pet_handler).get(handlers::list_pets_handler),
        )
        .route(
            "/pets/:id",
            get(handlers::get_pet_handler)
                .put(handlers::update_pet_handler)
                .delete(handlers::delete_pet_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(auth_state, auth_middleware));

    let api = Router::new()
        .route("/auth/login", post(handlers::login_handler))
        .merge(protected);

    let timeout_secs = app_state.config.request_timeout_secs;
    let body_limit = app_state.config.body_size_limit_bytes;

    // Layers listed outermost first
    let middleware_stack = ServiceBuilder::new()
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer())
        .layer(HandleErrorLayer::new(middleware::handle_layer_error))
        .layer(middleware::timeout_layer(Duration::from_secs(timeout_secs)))
        .layer(middleware::body_size_limit_layer(body_limit))
        .into_inner();

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health_handler))
        .layer(middleware_stack)
}
