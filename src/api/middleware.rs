// Middleware stack for observability and protection

use axum::{http::StatusCode, BoxError, Json};
use std::time::Duration;
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::api::responses::ErrorResponse;

/// Tracing middleware
///
/// Logs method, path, status and latency for every request.
pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

/// Body size limit middleware
///
/// Returns 413 Payload Too Large if exceeded
pub fn body_size_limit_layer(limit_bytes: usize) -> RequestBodyLimitLayer {
    RequestBodyLimitLayer::new(limit_bytes)
}

/// Request timeout middleware
pub fn timeout_layer(timeout: Duration) -> tower::timeout::TimeoutLayer {
    tower::timeout::TimeoutLayer::new(timeout)
}

/// CORS middleware; the API is consumed by a separately hosted client
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

/// Convert errors raised by tower layers (timeout, overload) into JSON responses
pub async fn handle_layer_error(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, message) = if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
    };
    (
        status,
        Json(ErrorResponse {
            error: message,
            request_id: None,
        }),
    )
}
