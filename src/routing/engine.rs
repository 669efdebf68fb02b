//! Routing Engine (spec §4.6): orchestrates policy → quota filter →
//! strategy score → multiplier → select. Never performs provider I/O and
//! never mutates key or quota state.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use super::decision::{Alternative, RoutingDecision};
use super::error::RoutingError;
use super::objective::RoutingObjective;
use super::strategies::strategy_for;
use crate::adapter::{AdapterRegistry, RequestIntent};
use crate::clock::Context;
use crate::cost::{CostController, CostEstimate};
use crate::key::model::Key;
use crate::key::KeyManager;
use crate::policy::{PolicyCandidate, PolicyContext, PolicyEngine};
use crate::quota::QuotaEngine;
use crate::store::StateStore;

/// Number of top-scoring non-selected candidates recorded as alternatives.
const ALTERNATIVES_LIMIT: usize = 5;

pub struct RoutingEngine {
    key_manager: Arc<KeyManager>,
    store: Arc<dyn StateStore>,
    quota_engine: Option<Arc<QuotaEngine>>,
    policy_engine: Option<Arc<PolicyEngine>>,
    cost_controller: Option<Arc<CostController>>,
    adapters: Option<Arc<AdapterRegistry>>,
    ctx: Context,
}

impl RoutingEngine {
    pub fn new(key_manager: Arc<KeyManager>, store: Arc<dyn StateStore>, ctx: Context) -> Self {
        Self {
            key_manager,
            store,
            quota_engine: None,
            policy_engine: None,
            cost_controller: None,
            adapters: None,
            ctx,
        }
    }

    pub fn with_quota_engine(mut self, quota_engine: Arc<QuotaEngine>) -> Self {
        self.quota_engine = Some(quota_engine);
        self
    }

    pub fn with_policy_engine(mut self, policy_engine: Arc<PolicyEngine>) -> Self {
        self.policy_engine = Some(policy_engine);
        self
    }

    pub fn with_cost_controller(mut self, cost_controller: Arc<CostController>) -> Self {
        self.cost_controller = Some(cost_controller);
        self
    }

    pub fn with_adapters(mut self, adapters: Arc<AdapterRegistry>) -> Self {
        self.adapters = Some(adapters);
        self
    }

    pub async fn route_request(
        &self,
        intent: &RequestIntent,
        objective: RoutingObjective,
    ) -> Result<RoutingDecision, RoutingError> {
        let provider_id = intent.provider_id.clone();

        // 1. eligible keys
        let mut candidates = self.key_manager.get_eligible_keys(&provider_id).await?;
        if candidates.is_empty() {
            return Err(RoutingError::NoEligibleKeys {
                provider_id,
                reason: "no keys registered or all keys ineligible by state".to_string(),
            });
        }

        let mut objective = objective;
        let mut policy_note = String::new();

        // The adapter's pricing model is a function of the request, not the
        // individual key, so one estimate here is reused for every candidate
        // below rather than re-derived per key.
        let cost_estimate: Option<CostEstimate> = if let Some(cost_controller) = &self.cost_controller {
            let adapter = self.adapters.as_ref().and_then(|r| r.get(&provider_id).ok());
            Some(
                cost_controller
                    .estimate_request_cost(intent, adapter.as_ref())
                    .await,
            )
        } else {
            None
        };

        // 2. policy filter
        if let Some(policy_engine) = &self.policy_engine {
            let policy_context = PolicyContext {
                candidates: candidates
                    .iter()
                    .map(|k| PolicyCandidate {
                        key_id: k.id.clone(),
                        provider_id: k.provider_id.clone(),
                        region: None,
                        usage_count: k.usage_count,
                        failure_count: k.failure_count,
                        estimated_cost: cost_estimate.as_ref().map(|e| e.amount),
                    })
                    .collect(),
                provider_id: provider_id.clone(),
            };
            let result = policy_engine.evaluate_all(Some(&provider_id), &policy_context);
            if !result.allowed {
                return Err(RoutingError::NoEligibleKeys {
                    provider_id,
                    reason: format!("policy rejected routing: {}", result.reason),
                });
            }
            candidates.retain(|k| !result.filtered_keys.contains(&k.id));
            if candidates.is_empty() {
                return Err(RoutingError::NoEligibleKeys {
                    provider_id,
                    reason: "all candidates filtered by policy".to_string(),
                });
            }
            if !result.constraints.preferred_providers.is_empty() {
                objective
                    .constraints
                    .get_or_insert_with(HashMap::new)
                    .insert(
                        "preferred_providers".to_string(),
                        result.constraints.preferred_providers.join(","),
                    );
            }
            if !result.applied_policies.is_empty() {
                policy_note = format!(
                    "policies applied: {}; ",
                    result.applied_policies.join(", ")
                );
            }
        }

        // 3. quota filter
        let mut quota_states = HashMap::new();
        if let Some(quota_engine) = &self.quota_engine {
            let (kept, states, dropped) = quota_engine.filter_by_quota_state(candidates.clone()).await?;
            if !dropped.is_empty() {
                info!(dropped = dropped.len(), "candidates exhausted per quota state");
            }
            candidates = kept;
            quota_states = states;
            if candidates.is_empty() {
                return Err(RoutingError::NoEligibleKeys {
                    provider_id,
                    reason: "all candidates exhausted per quota state".to_string(),
                });
            }
        }

        // 4. select strategy
        let strategy = strategy_for(&objective);

        // 5. score + multipliers + budget filter
        let costs: HashMap<String, Decimal> = match &cost_estimate {
            Some(estimate) => candidates
                .iter()
                .map(|k| (k.id.clone(), estimate.amount))
                .collect(),
            None => HashMap::new(),
        };
        let mut scores = strategy.score_keys(&candidates, &costs, &quota_states);
        if let Some(quota_engine) = &self.quota_engine {
            quota_engine.apply_quota_multipliers(&mut scores, &quota_states);
        }

        if let Some(cost_controller) = &self.cost_controller {
            let estimate = cost_estimate
                .clone()
                .unwrap_or_else(|| CostEstimate::zero("USD"));
            let mut survivors = Vec::new();
            for key in &candidates {
                let check = cost_controller.check_budget(&provider_id, &key.id, None, &estimate);
                if !check.violated_budget_ids.is_empty() {
                    scores.remove(&key.id);
                    continue;
                }
                if check.would_exceed {
                    if let Some(score) = scores.get_mut(&key.id) {
                        *score *= 0.5;
                    }
                }
                survivors.push(key.clone());
            }
            candidates = survivors;
            if candidates.is_empty() {
                return Err(RoutingError::NoEligibleKeys {
                    provider_id,
                    reason: "all candidates violate a hard budget".to_string(),
                });
            }
        }

        // 6. select + build decision
        let last_selected = candidates
            .iter()
            .filter_map(|k| k.last_used_at.map(|t| (t, k.id.clone())))
            .max_by_key(|(t, _)| *t)
            .map(|(_, id)| id);
        let (selected_id, selected_score) =
            strategy.select_key(&scores, &candidates, last_selected.as_deref());

        let explanation = format!(
            "{}{}",
            policy_note,
            strategy.generate_explanation(&selected_id, &scores, &candidates, &costs)
        );

        let mut scored_alternatives: Vec<&Key> = candidates
            .iter()
            .filter(|k| k.id != selected_id)
            .collect();
        scored_alternatives.sort_by(|a, b| {
            scores
                .get(&b.id)
                .unwrap_or(&0.0)
                .partial_cmp(scores.get(&a.id).unwrap_or(&0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let alternatives: Vec<Alternative> = scored_alternatives
            .into_iter()
            .take(ALTERNATIVES_LIMIT)
            .map(|k| Alternative {
                key_id: k.id.clone(),
                provider_id: k.provider_id.clone(),
                score: scores.get(&k.id).copied().unwrap_or(0.0),
                reason_not_selected: "lower score than selected key".to_string(),
            })
            .collect();

        let decision = RoutingDecision {
            id: Uuid::new_v4().to_string(),
            request_id: Uuid::new_v4().to_string(),
            selected_key_id: selected_id,
            selected_provider_id: provider_id,
            decision_timestamp: self.ctx.now(),
            objective,
            eligible_key_ids: candidates.iter().map(|k| k.id.clone()).collect(),
            scores,
            explanation,
            confidence: selected_score.clamp(0.0, 1.0),
            alternatives,
        };

        self.store.save_routing_decision(&decision).await.map_err(RoutingError::Store)?;
        info!(decision_id = %decision.id, selected_key_id = %decision.selected_key_id, "routing_decision_made");
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIdSource};
    use crate::key::model::Metadata;
    use crate::crypto::EncryptionService;
    use crate::routing::objective::Objective;
    use crate::store::memory::InMemoryStateStore;
    use chrono::Utc;

    fn engine() -> (RoutingEngine, Arc<KeyManager>) {
        let ctx = Context::new(
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(SequentialIdSource::new("route-test")),
        );
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new(1000, 1000));
        let encryption = Arc::new(EncryptionService::new(&[4u8; 32]).unwrap());
        let key_manager = Arc::new(KeyManager::new(store.clone(), encryption, ctx.clone()));
        let routing_engine = RoutingEngine::new(key_manager.clone(), store, ctx);
        (routing_engine, key_manager)
    }

    #[tokio::test]
    async fn fairness_selects_among_eligible_keys() {
        let (routing_engine, key_manager) = engine();
        key_manager
            .register_key("sk-aaaaaaaaaaaaaaaaaaaa", "openai", Metadata::new())
            .await
            .unwrap();
        key_manager
            .register_key("sk-bbbbbbbbbbbbbbbbbbbb", "openai", Metadata::new())
            .await
            .unwrap();

        let intent = RequestIntent {
            model: "gpt-4".to_string(),
            messages: vec![crate::adapter::Message {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            parameters: Default::default(),
            provider_id: "openai".to_string(),
        };

        let decision = routing_engine
            .route_request(&intent, RoutingObjective::primary_only(Objective::Fairness))
            .await
            .unwrap();

        assert!(decision.check_invariants());
        assert_eq!(decision.eligible_key_ids.len(), 2);
    }

    #[tokio::test]
    async fn no_keys_raises_no_eligible_keys() {
        let (routing_engine, _key_manager) = engine();
        let intent = RequestIntent {
            model: "gpt-4".to_string(),
            messages: vec![crate::adapter::Message {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            parameters: Default::default(),
            provider_id: "openai".to_string(),
        };
        let result = routing_engine
            .route_request(&intent, RoutingObjective::default_fairness())
            .await;
        assert!(matches!(result, Err(RoutingError::NoEligibleKeys { .. })));
    }
}
