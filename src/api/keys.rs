//! Key lifecycle management endpoints: register, list, rotate, revoke.
//! Never returns key material, even encrypted — handlers deal exclusively in
//! `KeyView`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use super::types::{ApiError, RegisterKeyRequest, RotateKeyRequest};
use super::AppState;
use crate::key::model::KeyView;

#[derive(Debug, Deserialize)]
pub struct ListKeysQuery {
    pub provider_id: Option<String>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterKeyRequest>,
) -> Result<Json<KeyView>, ApiError> {
    let key = state
        .key_manager
        .register_key(&body.material, &body.provider_id, body.metadata)
        .await?;
    Ok(Json(KeyView::from(&key)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<Vec<KeyView>>, ApiError> {
    let keys = state
        .key_manager
        .list_keys(query.provider_id.as_deref())
        .await?;
    Ok(Json(keys.iter().map(KeyView::from).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
) -> Result<Json<KeyView>, ApiError> {
    let key = state.key_manager.get_key(&key_id).await?;
    Ok(Json(KeyView::from(&key)))
}

pub async fn rotate(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
    Json(body): Json<RotateKeyRequest>,
) -> Result<Json<KeyView>, ApiError> {
    let key = state.key_manager.rotate(&key_id, &body.material).await?;
    Ok(Json(KeyView::from(&key)))
}

pub async fn revoke(
    State(state): State<Arc<AppState>>,
    Path(key_id): Path<String>,
) -> Result<(), ApiError> {
    state.key_manager.revoke(&key_id).await?;
    Ok(())
}
