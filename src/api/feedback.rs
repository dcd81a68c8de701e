use crate::api::{ApiAppState, ApiError};
use crate::event::Position;
use crate::state::{Agent, AgentPatch};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, patch, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Arrival report body
#[derive(Debug, Deserialize)]
pub struct ArrivalRequest {
    pub position: Position,
}

/// Create renderer write-back router
pub fn create_feedback_router(state: Arc<ApiAppState>) -> Router {
    Router::new()
        .route("/api/agents/:id", patch(update_agent).delete(remove_agent))
        .route("/api/agents/:id/arrival", post(report_arrival))
        .route("/api/indicators/:id", delete(clear_indicator))
        .with_state(state)
}

/// PATCH /api/agents/:id - Merge fields into an agent (creates unknown ids)
async fn update_agent(
    State(state): State<Arc<ApiAppState>>,
    Path(id): Path<String>,
    Json(patch): Json<AgentPatch>,
) -> Json<Agent> {
    Json(state.store.update_agent(&id, patch))
}

/// POST /api/agents/:id/arrival - Renderer reached the target
async fn report_arrival(
    State(state): State<Arc<ApiAppState>>,
    Path(id): Path<String>,
    Json(request): Json<ArrivalRequest>,
) -> Json<Agent> {
    Json(state.store.report_arrival(&id, request.position))
}

/// DELETE /api/agents/:id - Agent departed
async fn remove_agent(
    State(state): State<Arc<ApiAppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .remove_agent(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ApiError::AgentNotFound)
}

/// DELETE /api/indicators/:id - Dismiss an indicator early
async fn clear_indicator(
    State(state): State<Arc<ApiAppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .clear_move_indicator(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ApiError::IndicatorNotFound)
}
