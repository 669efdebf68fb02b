//! Budget management endpoints (spec §4.3).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use super::types::{ApiError, CreateBudgetRequest};
use super::AppState;
use crate::cost::model::Budget;

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBudgetRequest>,
) -> Result<Json<Budget>, ApiError> {
    let budget = state.cost_controller.create_budget(
        body.scope,
        body.scope_id,
        body.limit,
        body.currency,
        body.period,
        body.enforcement_mode,
        body.alert_threshold,
    )?;
    Ok(Json(budget))
}

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<Budget>> {
    Json(state.cost_controller.list_budgets())
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(budget_id): Path<String>,
) -> Result<Json<Budget>, ApiError> {
    let budget = state.cost_controller.get_budget(&budget_id)?;
    Ok(Json(budget))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(budget_id): Path<String>,
) -> Result<(), ApiError> {
    state.cost_controller.delete_budget(&budget_id)?;
    Ok(())
}
