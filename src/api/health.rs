//! Router health endpoint: uptime and a cheap signal that the core's
//! injected dependencies are reachable.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub registered_providers: usize,
}

pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        registered_providers: state.adapters.provider_ids().len(),
    })
}
