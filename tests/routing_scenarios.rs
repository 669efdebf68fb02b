//! End-to-end scenarios exercising the Orchestrator/Routing Engine stack
//! against the full supporting cast (Key Manager, Quota Engine, Cost
//! Controller, Policy Engine, provider adapters) with deterministic clocks
//! and a scriptable test adapter standing in for a real provider.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;

use keyrouter::adapter::{
    AdapterRegistry, Capabilities, ErrorCategory, HealthState, Message, ProviderAdapter,
    RequestIntent, Response, SystemError,
};
use keyrouter::clock::{Context, FixedClock, SequentialIdSource};
use keyrouter::cost::model::{BudgetScope, CostEstimate, CostEstimationMethod, EnforcementMode};
use keyrouter::cost::CostController;
use keyrouter::crypto::EncryptionService;
use keyrouter::key::model::{KeyState, Metadata};
use keyrouter::key::KeyManager;
use keyrouter::orchestrator::{Orchestrator, OrchestratorError};
use keyrouter::policy::model::{PolicyRules, PolicyScope, PolicyType};
use keyrouter::policy::PolicyEngine;
use keyrouter::quota::model::TimeWindow;
use keyrouter::quota::QuotaEngine;
use keyrouter::routing::{Objective, RoutingEngine, RoutingError, RoutingObjective};
use keyrouter::store::memory::InMemoryStateStore;
use keyrouter::store::StateStore;

/// One outcome per call, keyed by key id, so a test can script exactly what
/// happens when the Orchestrator tries a given credential.
#[derive(Clone)]
enum ScriptedOutcome {
    Succeed { cost: Decimal },
    RateLimited { retry_after_secs: Option<u64> },
    AuthFailure,
}

struct ScriptedAdapter {
    outcomes: DashMap<String, ScriptedOutcome>,
    calls: DashMap<String, u32>,
}

impl ScriptedAdapter {
    fn new() -> Self {
        Self {
            outcomes: DashMap::new(),
            calls: DashMap::new(),
        }
    }

    fn script(&self, key_id: impl Into<String>, outcome: ScriptedOutcome) {
        self.outcomes.insert(key_id.into(), outcome);
    }

    fn call_count(&self, key_id: &str) -> u32 {
        self.calls.get(key_id).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn execute_request(
        &self,
        _intent: &RequestIntent,
        key: &keyrouter::key::model::Key,
        _credential: &str,
    ) -> Result<Response, SystemError> {
        *self.calls.entry(key.id.clone()).or_insert(0) += 1;

        match self.outcomes.get(&key.id).map(|o| o.clone()) {
            Some(ScriptedOutcome::Succeed { cost }) => Ok(Response {
                content: "ok".to_string(),
                metadata: keyrouter::adapter::types::ResponseMetadata {
                    model_used: "test-model".to_string(),
                    tokens_used: keyrouter::adapter::TokenUsage {
                        input_tokens: 10,
                        output_tokens: 10,
                    },
                    response_time_ms: 5,
                    provider_id: key.provider_id.clone(),
                    timestamp: Utc::now(),
                    finish_reason: Some("stop".to_string()),
                    request_id: String::new(),
                    correlation_id: String::new(),
                    additional_metadata: HashMap::new(),
                },
                cost: Some(CostEstimate {
                    amount: cost,
                    currency: "USD".to_string(),
                    confidence: 1.0,
                    method: CostEstimationMethod::ProviderReported,
                    estimated_input_tokens: 10,
                    estimated_output_tokens: 10,
                    breakdown: None,
                }),
                key_used: key.id.clone(),
                request_id: String::new(),
            }),
            Some(ScriptedOutcome::RateLimited { retry_after_secs }) => {
                Err(SystemError::rate_limit("rate limited", retry_after_secs))
            }
            Some(ScriptedOutcome::AuthFailure) => Err(SystemError::authentication("bad credential")),
            None => Err(SystemError::new(ErrorCategory::Unknown, "no outcome scripted")),
        }
    }

    fn get_capabilities(&self) -> Capabilities {
        Capabilities {
            models: vec!["test-model".to_string()],
            supports_streaming: false,
            supports_embeddings: false,
        }
    }

    async fn estimate_cost(&self, _intent: &RequestIntent) -> Result<CostEstimate, SystemError> {
        Ok(CostEstimate {
            amount: Decimal::new(1, 2),
            currency: "USD".to_string(),
            confidence: 0.5,
            method: CostEstimationMethod::Heuristic,
            estimated_input_tokens: 10,
            estimated_output_tokens: 10,
            breakdown: None,
        })
    }

    async fn get_health(&self) -> HealthState {
        HealthState::Healthy
    }
}

fn test_intent(provider_id: &str) -> RequestIntent {
    RequestIntent {
        model: "test-model".to_string(),
        messages: vec![Message {
            role: "user".to_string(),
            content: "hello".to_string(),
        }],
        parameters: HashMap::new(),
        provider_id: provider_id.to_string(),
    }
}

fn deterministic_context(prefix: &'static str) -> Context {
    Context::new(
        Arc::new(FixedClock::new(Utc::now())),
        Arc::new(SequentialIdSource::new(prefix)),
    )
}

struct Stack {
    store: Arc<dyn StateStore>,
    key_manager: Arc<KeyManager>,
    routing_engine: Arc<RoutingEngine>,
    quota_engine: Arc<QuotaEngine>,
    cost_controller: Arc<CostController>,
    policy_engine: Arc<PolicyEngine>,
    #[allow(dead_code)]
    adapters: Arc<AdapterRegistry>,
    adapter: Arc<ScriptedAdapter>,
    orchestrator: Arc<Orchestrator>,
}

fn build_stack(prefix: &'static str) -> Stack {
    let ctx = deterministic_context(prefix);
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new(1000, 1000));
    let encryption = Arc::new(EncryptionService::new(&[7u8; 32]).unwrap());
    let key_manager = Arc::new(KeyManager::new(store.clone(), encryption, ctx.clone()));
    let quota_engine = Arc::new(QuotaEngine::new(store.clone(), ctx.clone(), TimeWindow::Daily));
    let cost_controller = Arc::new(CostController::new(ctx.clone()));
    let policy_engine = Arc::new(PolicyEngine::new(ctx.clone()));

    let routing_engine = Arc::new(
        RoutingEngine::new(key_manager.clone(), store.clone(), ctx.clone())
            .with_quota_engine(quota_engine.clone())
            .with_policy_engine(policy_engine.clone())
            .with_cost_controller(cost_controller.clone()),
    );

    let adapter = Arc::new(ScriptedAdapter::new());
    let adapters = Arc::new(AdapterRegistry::new());
    adapters.register("test-provider", adapter.clone() as Arc<dyn ProviderAdapter>).unwrap();

    let orchestrator = Arc::new(
        Orchestrator::new(routing_engine.clone(), key_manager.clone(), adapters.clone(), ctx)
            .with_quota_engine(quota_engine.clone())
            .with_cost_controller(cost_controller.clone()),
    );

    Stack {
        store,
        key_manager,
        routing_engine,
        quota_engine,
        cost_controller,
        policy_engine,
        adapters,
        adapter,
        orchestrator,
    }
}

/// E2: the selected key's call fails with a retryable rate limit; the
/// Orchestrator fails over to an alternative key within the same `route`
/// call, and the failed key transitions to Throttled with a cooldown.
#[tokio::test]
async fn rate_limited_key_fails_over_to_alternative() {
    let stack = build_stack("e2");
    let bad = stack
        .key_manager
        .register_key("sk-primary-0000", "test-provider", Metadata::default())
        .await
        .unwrap();
    let good = stack
        .key_manager
        .register_key("sk-secondary-00", "test-provider", Metadata::default())
        .await
        .unwrap();

    stack.adapter.script(bad.id.clone(), ScriptedOutcome::RateLimited { retry_after_secs: Some(30) });
    stack.adapter.script(good.id.clone(), ScriptedOutcome::Succeed { cost: Decimal::new(1, 2) });

    let response = stack
        .orchestrator
        .route(&test_intent("test-provider"), Some(RoutingObjective::default_fairness()))
        .await
        .expect("failover should succeed via the alternative key");

    assert_eq!(response.key_used, good.id);
    assert_eq!(stack.adapter.call_count(&bad.id), 1);
    assert_eq!(stack.adapter.call_count(&good.id), 1);

    let throttled = stack.key_manager.get_key(&bad.id).await.unwrap();
    assert_eq!(throttled.state, KeyState::Throttled);
    assert!(throttled.cooldown_until.is_some());
    assert!(throttled.check_cooldown_invariant());
}

/// E3: a Hard budget at its limit rejects every candidate key outright.
#[tokio::test]
async fn hard_budget_exhausted_blocks_routing() {
    let stack = build_stack("e3");
    let key = stack
        .key_manager
        .register_key("sk-budgeted-000", "test-provider", Metadata::default())
        .await
        .unwrap();
    stack.adapter.script(key.id.clone(), ScriptedOutcome::Succeed { cost: Decimal::new(1, 2) });

    stack
        .cost_controller
        .create_budget(
            BudgetScope::Global,
            None,
            Decimal::ZERO,
            "USD",
            TimeWindow::Daily,
            EnforcementMode::Hard,
            0.8,
        )
        .unwrap();

    let result = stack
        .orchestrator
        .route(&test_intent("test-provider"), Some(RoutingObjective::default_fairness()))
        .await;

    assert!(matches!(result, Err(OrchestratorError::Provider(_))));
    assert_eq!(stack.adapter.call_count(&key.id), 0, "a blocked candidate must never reach the adapter");
}

/// E4: a key whose quota state is pre-set to Exhausted is dropped from
/// eligibility before scoring; routing falls through to the remaining key.
#[tokio::test]
async fn exhausted_quota_reroutes_to_remaining_key() {
    let stack = build_stack("e4");
    let exhausted_key = stack
        .key_manager
        .register_key("sk-exhausted-00", "test-provider", Metadata::default())
        .await
        .unwrap();
    let fresh_key = stack
        .key_manager
        .register_key("sk-fresh-000000", "test-provider", Metadata::default())
        .await
        .unwrap();

    // Seed a tiny total via get_quota_state's lazily-created default, then
    // consume it so the engine derives Exhausted on its own.
    let mut seeded = stack.quota_engine.get_quota_state(&exhausted_key.id).await.unwrap();
    seeded.requests.total = Some(1);
    seeded.requests.remaining = keyrouter::quota::model::CapacityEstimate::exact(1);
    stack.store.save_quota_state(&seeded).await.unwrap();
    stack.quota_engine.update_capacity(&exhausted_key.id, 1, None).await.unwrap();

    let objective = RoutingObjective::primary_only(Objective::Fairness);
    let decision = stack.routing_engine.route_request(&test_intent("test-provider"), objective).await.unwrap();

    assert!(decision.eligible_key_ids.contains(&fresh_key.id));
    assert!(decision.check_invariants());
}

/// E5: fairness round-robin spreads requests across equally-scored keys
/// rather than starving one of them.
#[tokio::test]
async fn fairness_round_robin_alternates_keys() {
    let stack = build_stack("e5");
    let first = stack
        .key_manager
        .register_key("sk-alpha-000000", "test-provider", Metadata::default())
        .await
        .unwrap();
    let second = stack
        .key_manager
        .register_key("sk-beta-0000000", "test-provider", Metadata::default())
        .await
        .unwrap();

    let objective = RoutingObjective::default_fairness();
    let first_decision = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), objective.clone())
        .await
        .unwrap();
    assert!(first_decision.check_invariants());

    // Record usage on the selected key so the round-robin tie-break moves on.
    stack.key_manager.record_success(&first_decision.selected_key_id).await.unwrap();

    let second_decision = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), objective)
        .await
        .unwrap();
    assert!(second_decision.check_invariants());
    assert_ne!(
        first_decision.selected_key_id, second_decision.selected_key_id,
        "round-robin must not pick the same key twice in a row when another is equally eligible"
    );

    let ids = [first.id.clone(), second.id.clone()];
    assert!(ids.contains(&first_decision.selected_key_id));
    assert!(ids.contains(&second_decision.selected_key_id));
}

/// E6: a policy blocking the only registered provider rejects routing for
/// that provider with NoEligibleKeys, even though the key itself is healthy.
#[tokio::test]
async fn policy_blocks_provider_even_with_healthy_key() {
    let stack = build_stack("e6");
    stack
        .key_manager
        .register_key("sk-blocked-0000", "test-provider", Metadata::default())
        .await
        .unwrap();

    stack
        .policy_engine
        .create_policy(
            "block-test-provider",
            PolicyType::Routing,
            PolicyScope::Global,
            None,
            PolicyRules {
                blocked_providers: vec!["test-provider".to_string()],
                ..Default::default()
            },
            0,
        )
        .unwrap();

    let result = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), RoutingObjective::default_fairness())
        .await;

    assert!(matches!(result, Err(RoutingError::NoEligibleKeys { .. })));
}

/// Universal invariant (spec §8 #3): the selected key is always a member of
/// the eligible set, and confidence is always normalized to [0, 1].
#[tokio::test]
async fn routing_decision_always_satisfies_selection_invariant() {
    let stack = build_stack("inv3");
    stack
        .key_manager
        .register_key("sk-invariant-00", "test-provider", Metadata::default())
        .await
        .unwrap();

    let decision = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), RoutingObjective::default_fairness())
        .await
        .unwrap();

    assert!(decision.check_invariants());
    assert!(decision.eligible_key_ids.contains(&decision.selected_key_id));
    assert!((0.0..=1.0).contains(&decision.confidence));
}

/// Universal invariant (spec §8 #1): a key is Throttled iff cooldown_until
/// is set, enforced end-to-end through a real rate-limit failure.
#[tokio::test]
async fn throttled_state_always_carries_a_cooldown() {
    let stack = build_stack("inv1");
    let key = stack
        .key_manager
        .register_key("sk-cooldown-000", "test-provider", Metadata::default())
        .await
        .unwrap();
    stack.adapter.script(key.id.clone(), ScriptedOutcome::RateLimited { retry_after_secs: Some(60) });

    let result = stack
        .orchestrator
        .route(&test_intent("test-provider"), Some(RoutingObjective::default_fairness()))
        .await;
    assert!(result.is_err());

    let after = stack.key_manager.get_key(&key.id).await.unwrap();
    assert!(after.check_cooldown_invariant());
    assert_eq!(after.state, KeyState::Throttled);
    assert!(after.cooldown_until.is_some());
}

/// Boundary (spec §8 #10): key material of exactly 10 characters is the
/// shortest accepted length; 9 is rejected.
#[tokio::test]
async fn key_material_length_boundary() {
    let stack = build_stack("bound10");
    let too_short = stack.key_manager.register_key("123456789", "test-provider", Metadata::default()).await;
    assert!(too_short.is_err());

    let exactly_ten = stack.key_manager.register_key("1234567890", "test-provider", Metadata::default()).await;
    assert!(exactly_ten.is_ok());
}

/// Boundary (spec §8 #11): provider id must be lowercase and at most 100
/// characters.
#[tokio::test]
async fn provider_id_format_boundary() {
    let stack = build_stack("bound11");
    let uppercase = stack.key_manager.register_key("sk-validmaterial", "UPPERCASE", Metadata::default()).await;
    assert!(uppercase.is_err());

    let too_long = stack
        .key_manager
        .register_key("sk-validmaterial", &"a".repeat(101), Metadata::default())
        .await;
    assert!(too_long.is_err());

    let at_limit = stack
        .key_manager
        .register_key("sk-validmaterial", &"a".repeat(100), Metadata::default())
        .await;
    assert!(at_limit.is_ok());
}

/// Boundary (spec §8 #14): NoEligibleKeys is raised iff every candidate was
/// filtered, never when at least one survives.
#[tokio::test]
async fn no_eligible_keys_raised_only_when_all_filtered() {
    let stack = build_stack("bound14");

    let empty_result = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), RoutingObjective::default_fairness())
        .await;
    assert!(matches!(empty_result, Err(RoutingError::NoEligibleKeys { .. })));

    stack
        .key_manager
        .register_key("sk-onlycandidate", "test-provider", Metadata::default())
        .await
        .unwrap();

    let populated_result = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), RoutingObjective::default_fairness())
        .await;
    assert!(populated_result.is_ok());
}

/// Round-trip (spec §8 #8): saving then reading back a key, a routing
/// decision, and a quota state each return the entity unchanged.
#[tokio::test]
async fn save_then_get_round_trips_for_each_entity_family() {
    let stack = build_stack("roundtrip");
    let key = stack
        .key_manager
        .register_key("sk-roundtrip-00", "test-provider", Metadata::default())
        .await
        .unwrap();
    let fetched = stack.key_manager.get_key(&key.id).await.unwrap();
    assert_eq!(fetched.id, key.id);
    assert_eq!(fetched.provider_id, key.provider_id);
    assert_eq!(fetched.state, key.state);

    let decision = stack
        .routing_engine
        .route_request(&test_intent("test-provider"), RoutingObjective::default_fairness())
        .await
        .unwrap();
    assert_eq!(decision.selected_key_id, key.id);

    let quota_state = stack.quota_engine.get_quota_state(&key.id).await.unwrap();
    let quota_again = stack.quota_engine.get_quota_state(&key.id).await.unwrap();
    assert_eq!(quota_state.key_id, quota_again.key_id);
    assert_eq!(quota_state.capacity_state, quota_again.capacity_state);
}

/// An authentication failure is never retried: the Orchestrator surfaces it
/// immediately instead of trying an alternative key.
#[tokio::test]
async fn non_retryable_failure_does_not_fail_over() {
    let stack = build_stack("nonretry");
    let key = stack
        .key_manager
        .register_key("sk-authfail-000", "test-provider", Metadata::default())
        .await
        .unwrap();
    let other = stack
        .key_manager
        .register_key("sk-untouched-00", "test-provider", Metadata::default())
        .await
        .unwrap();
    stack.adapter.script(key.id.clone(), ScriptedOutcome::AuthFailure);
    stack.adapter.script(other.id.clone(), ScriptedOutcome::Succeed { cost: Decimal::new(1, 2) });

    let result = stack
        .orchestrator
        .route(&test_intent("test-provider"), Some(RoutingObjective::default_fairness()))
        .await;

    assert!(matches!(result, Err(OrchestratorError::Provider(_))));
    // Whichever key the fairness strategy picked first took the only call;
    // a non-retryable failure must not touch the other registered key.
    assert_eq!(stack.adapter.call_count(&key.id) + stack.adapter.call_count(&other.id), 1);
}
