//! Budget and cost-estimate entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::quota::model::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    Global,
    PerProvider,
    PerKey,
    PerTeam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    Hard,
    Soft,
    Advisory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub scope: BudgetScope,
    pub scope_id: Option<String>,
    pub limit: Decimal,
    pub currency: String,
    pub period: TimeWindow,
    pub current_spend: Decimal,
    pub period_start: DateTime<Utc>,
    pub enforcement_mode: EnforcementMode,
    pub alert_threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn applies_to(&self, provider_id: &str, key_id: &str, team_id: Option<&str>) -> bool {
        match self.scope {
            BudgetScope::Global => true,
            BudgetScope::PerProvider => self.scope_id.as_deref() == Some(provider_id),
            BudgetScope::PerKey => self.scope_id.as_deref() == Some(key_id),
            BudgetScope::PerTeam => team_id.is_some() && self.scope_id.as_deref() == team_id,
        }
    }

    pub fn remaining(&self) -> Decimal {
        (self.limit - self.current_spend).max(Decimal::ZERO)
    }

    pub fn usage_fraction(&self) -> f64 {
        if self.limit.is_zero() {
            return 1.0;
        }
        (self.current_spend / self.limit)
            .to_string()
            .parse::<f64>()
            .unwrap_or(1.0)
    }

    /// Roll the period over if `now` has passed `period_start + period`.
    /// Idempotent: calling twice with the same `now` only rolls once,
    /// because the second call observes `period_start` already advanced.
    pub fn maybe_roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let period_end = self.period_start + self.period.duration();
        if now < period_end {
            return false;
        }
        self.current_spend = Decimal::ZERO;
        self.period_start = period_end;
        self.updated_at = now;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostEstimationMethod {
    AdapterReported,
    TokenHeuristic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub amount: Decimal,
    pub currency: String,
    pub confidence: f64,
    pub method: CostEstimationMethod,
    pub estimated_input_tokens: u32,
    pub estimated_output_tokens: u32,
    pub breakdown: Option<HashMap<String, Decimal>>,
}

impl CostEstimate {
    pub fn zero(currency: impl Into<String>) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: currency.into(),
            confidence: 0.0,
            method: CostEstimationMethod::TokenHeuristic,
            estimated_input_tokens: 0,
            estimated_output_tokens: 0,
            breakdown: None,
        }
    }
}

/// Result of `Budget::check` for a single candidate.
#[derive(Debug, Clone)]
pub struct BudgetCheckResult {
    pub allowed: bool,
    pub would_exceed: bool,
    pub remaining_by_budget: HashMap<String, Decimal>,
    pub violated_budget_ids: Vec<String>,
    pub reason: String,
}

/// Reconciliation record comparing an estimated cost to the actual cost
/// reported once the provider call completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReconciliation {
    pub request_id: String,
    pub provider_id: String,
    pub key_id: String,
    pub estimated: Decimal,
    pub actual: Decimal,
    pub delta: Decimal,
    pub delta_percent: f64,
    pub recorded_at: DateTime<Utc>,
}
