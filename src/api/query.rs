use crate::api::{ApiAppState, ApiError};
use crate::connection::ConnectionStats;
use crate::state::{Agent, MoveIndicator};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Connectivity and store summary
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub url: String,
    pub agents: usize,
    pub indicators: usize,
    #[serde(rename = "eventsApplied")]
    pub events_applied: u64,
    pub stats: ConnectionStats,
}

/// Create read-only query router
pub fn create_query_router(state: Arc<ApiAppState>) -> Router {
    Router::new()
        .route("/api/agents", get(list_agents))
        .route("/api/agents/:id", get(get_agent))
        .route("/api/indicators", get(list_indicators))
        .route("/api/status", get(status))
        .with_state(state)
}

/// GET /api/agents - List all agents
async fn list_agents(State(state): State<Arc<ApiAppState>>) -> Json<Vec<Agent>> {
    Json(state.store.list_agents())
}

/// GET /api/agents/:id - Get specific agent
async fn get_agent(
    State(state): State<Arc<ApiAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ApiError> {
    state
        .store
        .get_agent(&id)
        .map(Json)
        .ok_or(ApiError::AgentNotFound)
}

/// GET /api/indicators - Active move indicators
async fn list_indicators(State(state): State<Arc<ApiAppState>>) -> Json<Vec<MoveIndicator>> {
    Json(state.store.list_move_indicators())
}

/// GET /api/status
async fn status(State(state): State<Arc<ApiAppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected: state.connection.is_connected(),
        url: state.connection.url().to_string(),
        agents: state.store.agent_count(),
        indicators: state.store.indicator_count(),
        events_applied: state.store.events_applied(),
        stats: state.connection.stats(),
    })
}
