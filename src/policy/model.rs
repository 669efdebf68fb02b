//! Policy entity and evaluation context/result (spec §4.4).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Routing,
    KeySelection,
    CostControl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    Global,
    Provider,
    Team,
}

/// Rule values a policy can carry. Kept as a small closed set rather than
/// free-form JSON so `PolicyEngine::evaluate` can match exhaustively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRules {
    #[serde(default)]
    pub blocked_providers: Vec<String>,
    #[serde(default)]
    pub blocked_regions: Vec<String>,
    #[serde(default)]
    pub preferred_providers: Vec<String>,
    #[serde(default)]
    pub preferred_regions: Vec<String>,
    pub min_reliability: Option<f64>,
    pub max_cost_per_request: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub scope: PolicyScope,
    pub scope_id: Option<String>,
    pub rules: PolicyRules,
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Policy {
    pub fn applies_to_scope(&self, scope: PolicyScope, scope_id: Option<&str>) -> bool {
        if self.scope != scope {
            return false;
        }
        match self.scope {
            PolicyScope::Global => true,
            PolicyScope::Provider | PolicyScope::Team => {
                self.scope_id.as_deref() == scope_id
            }
        }
    }
}

/// A key candidate as seen by policy evaluation: only what rules need, never
/// the decrypted material.
#[derive(Debug, Clone)]
pub struct PolicyCandidate {
    pub key_id: String,
    pub provider_id: String,
    pub region: Option<String>,
    pub usage_count: u64,
    pub failure_count: u64,
    pub estimated_cost: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct PolicyContext {
    pub candidates: Vec<PolicyCandidate>,
    pub provider_id: String,
}

/// Constraints a policy wants merged into the routing objective, distinct
/// from outright filtering.
#[derive(Debug, Clone, Default)]
pub struct PolicyConstraints {
    pub preferred_providers: Vec<String>,
    pub preferred_regions: Vec<String>,
    pub max_cost_per_request: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct PolicyResult {
    pub allowed: bool,
    pub reason: String,
    pub applied_policies: Vec<String>,
    pub constraints: PolicyConstraints,
    pub filtered_keys: Vec<String>,
}

impl PolicyResult {
    pub fn pass_through() -> Self {
        Self {
            allowed: true,
            reason: "no applicable policies".to_string(),
            applied_policies: Vec::new(),
            constraints: PolicyConstraints::default(),
            filtered_keys: Vec::new(),
        }
    }
}
