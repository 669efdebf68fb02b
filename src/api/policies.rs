//! Policy management endpoints (spec §4.4).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use super::types::{ApiError, CreatePolicyRequest};
use super::AppState;
use crate::policy::model::Policy;

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePolicyRequest>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state.policy_engine.create_policy(
        body.name,
        body.policy_type,
        body.scope,
        body.scope_id,
        body.rules,
        body.priority,
    )?;
    Ok(Json(policy))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<Policy>> {
    Json(state.policy_engine.list_policies())
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(policy_id): Path<String>,
) -> Result<(), ApiError> {
    state.policy_engine.delete_policy(&policy_id)?;
    Ok(())
}
