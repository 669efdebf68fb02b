//! Cost Controller: budget storage and enforcement (spec §4.3).
//!
//! Budgets are not one of the four `StateStore` entity families (Key,
//! QuotaState, RoutingDecision, StateTransition), so they're owned here
//! directly via a lock-free-read / per-entry-write `DashMap`.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adapter::{ProviderAdapter, RequestIntent};
use crate::clock::Context;
use crate::cost::error::CostError;
use crate::cost::model::{
    Budget, BudgetCheckResult, BudgetScope, CostEstimate, CostEstimationMethod, CostReconciliation,
    EnforcementMode,
};
use crate::logging::events;
use crate::quota::model::TimeWindow;

/// Flat fallback rate (USD per 1k tokens) used when no adapter is available
/// to report its own pricing. Deliberately provider-agnostic: this path only
/// runs when the real per-model price table the adapter carries can't be
/// reached.
const FALLBACK_RATE_PER_1K_TOKENS: &str = "0.02";

pub struct CostController {
    budgets: DashMap<String, Budget>,
    ctx: Context,
}

impl CostController {
    pub fn new(ctx: Context) -> Self {
        Self {
            budgets: DashMap::new(),
            ctx,
        }
    }

    pub fn create_budget(
        &self,
        scope: BudgetScope,
        scope_id: Option<String>,
        limit: Decimal,
        currency: impl Into<String>,
        period: TimeWindow,
        enforcement_mode: EnforcementMode,
        alert_threshold: f64,
    ) -> Result<Budget, CostError> {
        if limit < Decimal::ZERO {
            return Err(CostError::InvalidBudget(
                "limit must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&alert_threshold) {
            return Err(CostError::InvalidBudget(
                "alert_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        let now = self.ctx.now();
        let budget = Budget {
            id: Uuid::new_v4().to_string(),
            scope,
            scope_id,
            limit,
            currency: currency.into(),
            period,
            current_spend: Decimal::ZERO,
            period_start: now,
            enforcement_mode,
            alert_threshold,
            created_at: now,
            updated_at: now,
        };
        self.budgets.insert(budget.id.clone(), budget.clone());
        info!(budget_id = %budget.id, scope = ?budget.scope, "budget_created");
        Ok(budget)
    }

    pub fn get_budget(&self, budget_id: &str) -> Result<Budget, CostError> {
        self.budgets
            .get(budget_id)
            .map(|b| b.value().clone())
            .ok_or_else(|| CostError::BudgetNotFound(budget_id.to_string()))
    }

    pub fn list_budgets(&self) -> Vec<Budget> {
        self.budgets.iter().map(|e| e.value().clone()).collect()
    }

    pub fn delete_budget(&self, budget_id: &str) -> Result<(), CostError> {
        self.budgets
            .remove(budget_id)
            .map(|_| ())
            .ok_or_else(|| CostError::BudgetNotFound(budget_id.to_string()))
    }

    /// Budgets applying to this candidate, with any elapsed period rolled
    /// over first.
    fn applicable_budgets(&self, provider_id: &str, key_id: &str, team_id: Option<&str>) -> Vec<Budget> {
        let now = self.ctx.now();
        self.budgets
            .iter_mut()
            .filter_map(|mut entry| {
                entry.value_mut().maybe_roll_over(now);
                let budget = entry.value().clone();
                budget.applies_to(provider_id, key_id, team_id).then_some(budget)
            })
            .collect()
    }

    /// Estimate the cost of a request (spec §4.3): delegates to the provider
    /// adapter's own `estimate_cost` when one is available, falling back to
    /// a flat token-count heuristic when there's no adapter or the adapter
    /// call itself fails. Infallible by design — routing must always have
    /// *some* number to score and budget-check against.
    pub async fn estimate_request_cost(
        &self,
        intent: &RequestIntent,
        adapter: Option<&Arc<dyn ProviderAdapter>>,
    ) -> CostEstimate {
        if let Some(adapter) = adapter {
            match adapter.estimate_cost(intent).await {
                Ok(estimate) => return estimate,
                Err(err) => {
                    warn!(provider_id = %intent.provider_id, error = %err, "adapter cost estimate failed, falling back to token heuristic");
                }
            }
        }
        Self::token_heuristic_estimate(intent)
    }

    fn token_heuristic_estimate(intent: &RequestIntent) -> CostEstimate {
        let input_tokens = intent.estimated_input_tokens();
        let output_tokens = input_tokens / 2;
        let rate_per_1k: Decimal = FALLBACK_RATE_PER_1K_TOKENS.parse().unwrap();
        let amount = Decimal::from(input_tokens + output_tokens) * rate_per_1k / Decimal::from(1000);
        CostEstimate {
            amount,
            currency: "USD".to_string(),
            confidence: 0.3,
            method: CostEstimationMethod::TokenHeuristic,
            estimated_input_tokens: input_tokens,
            estimated_output_tokens: output_tokens,
            breakdown: None,
        }
    }

    /// Check whether `estimate` would push any applicable budget over its
    /// limit. Does not mutate spend; callers apply the estimate separately
    /// via `record_estimated_cost` once a key is selected.
    pub fn check_budget(
        &self,
        provider_id: &str,
        key_id: &str,
        team_id: Option<&str>,
        estimate: &CostEstimate,
    ) -> BudgetCheckResult {
        let applicable = self.applicable_budgets(provider_id, key_id, team_id);
        let mut remaining_by_budget = std::collections::HashMap::new();
        let mut violated_budget_ids = Vec::new();
        let mut would_exceed = false;

        for budget in &applicable {
            let projected = budget.current_spend + estimate.amount;
            let remaining = (budget.limit - projected).max(Decimal::ZERO);
            remaining_by_budget.insert(budget.id.clone(), remaining);
            if projected > budget.limit {
                would_exceed = true;
                if budget.enforcement_mode == EnforcementMode::Hard {
                    violated_budget_ids.push(budget.id.clone());
                }
            }
        }

        let allowed = violated_budget_ids.is_empty();
        let reason = if !allowed {
            format!("hard budgets exceeded: {violated_budget_ids:?}")
        } else if would_exceed {
            "soft or advisory budget would be exceeded".to_string()
        } else {
            "within budget".to_string()
        };

        BudgetCheckResult {
            allowed,
            would_exceed,
            remaining_by_budget,
            violated_budget_ids,
            reason,
        }
    }

    /// Enforce a budget check: returns `Ok(())` when the candidate may
    /// proceed, `Err(CostError::BudgetExceeded)` when a hard budget blocks it.
    /// Soft-violated budgets emit `budget_violation` but still allow the
    /// request; advisory-violated budgets only log, with no named event.
    pub fn enforce_budget(
        &self,
        provider_id: &str,
        key_id: &str,
        team_id: Option<&str>,
        estimate: &CostEstimate,
    ) -> Result<(), CostError> {
        let result = self.check_budget(provider_id, key_id, team_id, estimate);
        if !result.violated_budget_ids.is_empty() {
            let limit = self
                .applicable_budgets(provider_id, key_id, team_id)
                .into_iter()
                .find(|b| result.violated_budget_ids.contains(&b.id))
                .map(|b| b.limit)
                .unwrap_or(Decimal::ZERO);
            return Err(CostError::BudgetExceeded {
                remaining: Decimal::ZERO,
                violated: result.violated_budget_ids,
                cost: estimate.amount,
                limit,
                currency: estimate.currency.clone(),
            });
        }

        if result.would_exceed {
            for budget in self.applicable_budgets(provider_id, key_id, team_id) {
                let projected = budget.current_spend + estimate.amount;
                if projected <= budget.limit {
                    continue;
                }
                match budget.enforcement_mode {
                    EnforcementMode::Hard => {}
                    EnforcementMode::Soft => {
                        warn!(
                            budget_id = %budget.id,
                            cost = %estimate.amount,
                            limit = %budget.limit,
                            event = events::BUDGET_VIOLATION,
                            "budget_violation"
                        );
                    }
                    EnforcementMode::Advisory => {
                        info!(
                            budget_id = %budget.id,
                            cost = %estimate.amount,
                            limit = %budget.limit,
                            "advisory budget would be exceeded"
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Atomically add `amount` to every applicable budget's current spend.
    /// Each entry's rollover-then-add happens under that entry's own
    /// `DashMap` shard lock, so concurrent requests against different
    /// budgets never contend and concurrent requests against the same
    /// budget serialize correctly (no lost updates).
    fn apply_spend(&self, provider_id: &str, key_id: &str, team_id: Option<&str>, amount: Decimal) {
        let now = self.ctx.now();
        for mut entry in self.budgets.iter_mut() {
            let budget = entry.value_mut();
            budget.maybe_roll_over(now);
            if budget.applies_to(provider_id, key_id, team_id) {
                let before_fraction = budget.usage_fraction();
                budget.current_spend += amount;
                budget.updated_at = now;
                let after_fraction = budget.usage_fraction();
                if before_fraction < budget.alert_threshold && after_fraction >= budget.alert_threshold {
                    warn!(
                        budget_id = %budget.id,
                        usage_fraction = after_fraction,
                        "budget_threshold_crossed"
                    );
                }
            }
        }
    }

    pub fn record_estimated_cost(
        &self,
        provider_id: &str,
        key_id: &str,
        team_id: Option<&str>,
        estimate: &CostEstimate,
    ) {
        self.apply_spend(provider_id, key_id, team_id, estimate.amount);
    }

    /// Reconcile an estimate against the actual cost reported by the
    /// adapter: undo the estimated spend and apply the actual spend,
    /// returning the delta record for audit.
    pub fn record_actual_cost(
        &self,
        request_id: impl Into<String>,
        provider_id: &str,
        key_id: &str,
        team_id: Option<&str>,
        estimated: Decimal,
        actual: Decimal,
    ) -> CostReconciliation {
        let delta = actual - estimated;
        self.apply_spend(provider_id, key_id, team_id, -estimated);
        self.apply_spend(provider_id, key_id, team_id, actual);

        let delta_percent = if estimated.is_zero() {
            0.0
        } else {
            (delta / estimated)
                .to_string()
                .parse::<f64>()
                .unwrap_or(0.0)
                * 100.0
        };

        CostReconciliation {
            request_id: request_id.into(),
            provider_id: provider_id.to_string(),
            key_id: key_id.to_string(),
            estimated,
            actual,
            delta,
            delta_percent,
            recorded_at: self.ctx.now(),
        }
    }
}

/// Shared handle used by the Routing Engine and Orchestrator.
pub type SharedCostController = Arc<CostController>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Context, FixedClock, SequentialIdSource};
    use crate::cost::model::CostEstimationMethod;
    use chrono::Utc;

    fn ctx() -> Context {
        Context::new(
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(SequentialIdSource::new("cost-test")),
        )
    }

    fn estimate(amount: &str) -> CostEstimate {
        CostEstimate {
            amount: amount.parse().unwrap(),
            currency: "USD".to_string(),
            confidence: 1.0,
            method: CostEstimationMethod::AdapterReported,
            estimated_input_tokens: 10,
            estimated_output_tokens: 10,
            breakdown: None,
        }
    }

    #[test]
    fn hard_budget_blocks_over_limit_spend() {
        let controller = CostController::new(ctx());
        let budget = controller
            .create_budget(
                BudgetScope::PerProvider,
                Some("openai".to_string()),
                "10.00".parse().unwrap(),
                "USD",
                TimeWindow::Daily,
                EnforcementMode::Hard,
                0.8,
            )
            .unwrap();
        controller.record_estimated_cost("openai", "k1", None, &estimate("9.00"));
        let result = controller.enforce_budget("openai", "k1", None, &estimate("2.00"));
        assert!(result.is_err());
        assert_eq!(controller.get_budget(&budget.id).unwrap().current_spend, "9.00".parse().unwrap());
    }

    #[test]
    fn soft_budget_allows_but_flags_would_exceed() {
        let controller = CostController::new(ctx());
        controller
            .create_budget(
                BudgetScope::Global,
                None,
                "5.00".parse().unwrap(),
                "USD",
                TimeWindow::Daily,
                EnforcementMode::Soft,
                0.8,
            )
            .unwrap();
        let result = controller.check_budget("openai", "k1", None, &estimate("6.00"));
        assert!(result.allowed);
        assert!(result.would_exceed);
    }

    #[test]
    fn reconciliation_adjusts_spend_to_actual() {
        let controller = CostController::new(ctx());
        let budget = controller
            .create_budget(
                BudgetScope::Global,
                None,
                "100.00".parse().unwrap(),
                "USD",
                TimeWindow::Daily,
                EnforcementMode::Advisory,
                0.8,
            )
            .unwrap();
        controller.record_estimated_cost("openai", "k1", None, &estimate("5.00"));
        let reconciliation = controller.record_actual_cost(
            "req-1",
            "openai",
            "k1",
            None,
            "5.00".parse().unwrap(),
            "7.50".parse().unwrap(),
        );
        assert_eq!(reconciliation.delta, "2.50".parse().unwrap());
        assert_eq!(
            controller.get_budget(&budget.id).unwrap().current_spend,
            "7.50".parse().unwrap()
        );
    }
}
