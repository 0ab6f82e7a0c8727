//! Orchestrator API handlers.

use axum::{extract::State, Json};
use std::sync::Arc;
use steward_core::OrchestratorStatus;

use crate::state::AppState;

/// Poll loop and worker pool status.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status().await)
}
