use crate::hub::{HubState, LocationHub};
use crate::state::Location;
use crate::supervisor::ConnectionStatus;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Shared state for query API
pub struct QueryAppState {
    pub hub: LocationHub,
}

/// Status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: ConnectionStatus,
    #[serde(flatten)]
    pub state: HubState,
}

/// Create query API router
pub fn create_query_router(state: Arc<QueryAppState>) -> Router {
    Router::new()
        .route("/api/locations", get(list_locations))
        .route("/api/locations/refresh", post(refresh_locations))
        .route("/api/status", get(get_status))
        .with_state(state)
}

/// GET /api/locations - Cached driver locations
///
/// Returns whatever the hub currently holds; with no live observers this
/// may be stale.
async fn list_locations(State(state): State<Arc<QueryAppState>>) -> Json<Vec<Location>> {
    Json(state.hub.snapshot())
}

/// POST /api/locations/refresh - Trigger a full resync
///
/// Returns 202 immediately; the result is published to subscribers.
async fn refresh_locations(State(state): State<Arc<QueryAppState>>) -> impl IntoResponse {
    info!("Manual location refresh requested");
    state.hub.refresh();
    StatusCode::ACCEPTED
}

/// GET /api/status - Connection status and observer count
async fn get_status(State(state): State<Arc<QueryAppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.hub.status(),
        state: state.hub.state(),
    })
}
