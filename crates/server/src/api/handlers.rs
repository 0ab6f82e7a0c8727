use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use steward_core::SanitizedConfig;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// One catalog entry.
#[derive(Debug, Serialize)]
pub struct VlanEntry {
    pub name: String,
    pub id: u16,
}

/// VLAN catalog, ordered by id.
pub async fn list_vlans(State(state): State<Arc<AppState>>) -> Json<Vec<VlanEntry>> {
    Json(
        state
            .catalog()
            .entries()
            .into_iter()
            .map(|(name, id)| VlanEntry {
                name: name.to_string(),
                id,
            })
            .collect(),
    )
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state).await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
