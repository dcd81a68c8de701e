// Renderer-facing HTTP API: read surface and write-back surface

pub mod feedback;
pub mod query;

pub use feedback::create_feedback_router;
pub use query::create_query_router;

use crate::connection::ConnectionManager;
use crate::state::AgentStore;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

/// Shared application state for API handlers
pub struct ApiAppState {
    pub store: Arc<AgentStore>,
    pub connection: Arc<ConnectionManager>,
}

/// Full API router with CORS applied
pub fn create_router(state: Arc<ApiAppState>, allowed_origins: &[String]) -> Router {
    create_query_router(Arc::clone(&state))
        .merge(create_feedback_router(state))
        .layer(cors_layer(allowed_origins))
}

/// Permissive when no origins are configured, otherwise an exact allow-list
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    AgentNotFound,
    IndicatorNotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::AgentNotFound => (StatusCode::NOT_FOUND, "Agent not found"),
            ApiError::IndicatorNotFound => (StatusCode::NOT_FOUND, "Move indicator not found"),
        };

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
        });

        (status, body).into_response()
    }
}
