//! The core entry point applications call: `POST /route` executes a request
//! end-to-end through the Orchestrator; `GET /route/preview` returns the
//! routing decision the Orchestrator would make, without calling a provider
//! or spending budget. Neither requires bearer auth (spec §6: the `/route`
//! surface is a boundary concern, not a mutation of router configuration).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::types::{ApiError, RouteRequest};
use super::AppState;
use crate::adapter::{RequestIntent, Response as AdapterResponse};
use crate::routing::{RoutingDecision, RoutingObjective};

fn build_intent(body: &RouteRequest) -> RequestIntent {
    RequestIntent {
        model: body.model.clone(),
        messages: body.messages.clone(),
        parameters: body.parameters.clone(),
        provider_id: body.provider_id.clone(),
    }
}

fn build_objective(body: &RouteRequest) -> RoutingObjective {
    body.objective
        .as_deref()
        .map(RoutingObjective::from)
        .unwrap_or_else(RoutingObjective::default_fairness)
}

pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouteRequest>,
) -> Result<Json<AdapterResponse>, ApiError> {
    let intent = build_intent(&body);
    let objective = build_objective(&body);
    let response = state.orchestrator.route(&intent, Some(objective)).await?;
    Ok(Json(response))
}

pub async fn preview(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouteRequest>,
) -> Result<Json<RoutingDecision>, ApiError> {
    let intent = build_intent(&body);
    let objective = build_objective(&body);
    let decision = state
        .routing_engine
        .route_request(&intent, objective)
        .await
        .map_err(crate::orchestrator::OrchestratorError::from)?;
    Ok(Json(decision))
}
