//! Request/response bodies for the management API, plus the error envelope
//! every handler returns on failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::cost::{BudgetScope, EnforcementMode};
use crate::key::model::Metadata;
use crate::orchestrator::OrchestratorError;
use crate::policy::model::{PolicyRules, PolicyScope, PolicyType};
use crate::quota::model::TimeWindow;

/// Error envelope returned by every management-API handler on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    pub fn new(status_hint: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.into(),
                r#type: status_hint.to_string(),
                code: None,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("rate_limited", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    fn status_code(&self) -> StatusCode {
        match self.error.r#type.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "invalid_request" => StatusCode::BAD_REQUEST,
            "not_found" => StatusCode::NOT_FOUND,
            "budget_exceeded" => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let r#type = match &err {
            OrchestratorError::Routing(_) => "no_eligible_key",
            OrchestratorError::KeyManager(_) => "key_manager_error",
            OrchestratorError::NoAdapter(_) => "no_adapter",
            OrchestratorError::Cost(_) => "budget_exceeded",
            OrchestratorError::Quota(_) => "quota_error",
            OrchestratorError::Provider(_) => "provider_error",
        };
        Self::new(r#type, err.to_string())
    }
}

impl From<crate::key::KeyManagerError> for ApiError {
    fn from(err: crate::key::KeyManagerError) -> Self {
        Self::new("key_manager_error", err.to_string())
    }
}

impl From<crate::cost::CostError> for ApiError {
    fn from(err: crate::cost::CostError) -> Self {
        Self::new("budget_error", err.to_string())
    }
}

impl From<crate::policy::PolicyError> for ApiError {
    fn from(err: crate::policy::PolicyError) -> Self {
        Self::new("policy_error", err.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterKeyRequest {
    pub material: String,
    pub provider_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct RotateKeyRequest {
    pub material: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    pub scope: BudgetScope,
    pub scope_id: Option<String>,
    pub limit: rust_decimal::Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub period: TimeWindow,
    pub enforcement_mode: EnforcementMode,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_alert_threshold() -> f64 {
    0.8
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub scope: PolicyScope,
    pub scope_id: Option<String>,
    #[serde(default)]
    pub rules: PolicyRules,
    #[serde(default)]
    pub priority: i32,
}

/// Body for `POST /route`: a normalized inference request the Orchestrator
/// routes to a provider adapter.
#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub model: String,
    pub messages: Vec<crate::adapter::Message>,
    #[serde(default)]
    pub parameters: std::collections::HashMap<String, serde_json::Value>,
    pub provider_id: String,
    pub objective: Option<String>,
}
