//! Bearer-token auth for mutation endpoints (spec §6: management API is a
//! boundary concern, the `/route` entry point itself stays unauthenticated).

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::types::ApiError;
use super::AppState;

pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = &state.management_token else {
        return Ok(next.run(request).await);
    };

    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(ApiError::unauthorized("missing or invalid bearer token")),
    }
}
