//! Orchestrator (spec §4.7): the single public entry point. Turns a
//! `RequestIntent` into a `Response` by asking the Routing Engine for a
//! decision, resolving the provider adapter and decrypted credential, and
//! retrying across the decision's alternatives on retryable failure.

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

pub use error::OrchestratorError;

use crate::adapter::{AdapterRegistry, ErrorCategory, RequestIntent, Response, SystemError};
use crate::clock::Context;
use crate::cost::CostController;
use crate::key::{KeyManager, KeyState};
use crate::quota::QuotaEngine;
use crate::routing::{RoutingEngine, RoutingObjective};
use crate::store::redis_like::RedisLikeStateStore;

/// Maximum number of distinct keys tried for a single `route` call: the
/// selected key plus up to two alternatives (spec §4.7: "up to 3 attempts").
const MAX_ATTEMPTS: usize = 3;

pub struct Orchestrator {
    routing_engine: Arc<RoutingEngine>,
    key_manager: Arc<KeyManager>,
    adapters: Arc<AdapterRegistry>,
    quota_engine: Option<Arc<QuotaEngine>>,
    cost_controller: Option<Arc<CostController>>,
    redis_store: Option<Arc<RedisLikeStateStore>>,
    ctx: Context,
}

impl Orchestrator {
    pub fn new(
        routing_engine: Arc<RoutingEngine>,
        key_manager: Arc<KeyManager>,
        adapters: Arc<AdapterRegistry>,
        ctx: Context,
    ) -> Self {
        Self {
            routing_engine,
            key_manager,
            adapters,
            quota_engine: None,
            cost_controller: None,
            redis_store: None,
            ctx,
        }
    }

    pub fn with_quota_engine(mut self, quota_engine: Arc<QuotaEngine>) -> Self {
        self.quota_engine = Some(quota_engine);
        self
    }

    pub fn with_cost_controller(mut self, cost_controller: Arc<CostController>) -> Self {
        self.cost_controller = Some(cost_controller);
        self
    }

    /// Attach the Redis-like store backing so the recovery task also sweeps
    /// its TTL-orphaned entries. A no-op when the deployment is backed by a
    /// different `StateStore` implementation.
    pub fn with_redis_store(mut self, redis_store: Arc<RedisLikeStateStore>) -> Self {
        self.redis_store = Some(redis_store);
        self
    }

    /// Route one request end-to-end. `objective` defaults to fairness when
    /// absent (spec §4.7).
    pub async fn route(
        &self,
        intent: &RequestIntent,
        objective: Option<RoutingObjective>,
    ) -> Result<Response, OrchestratorError> {
        let objective = objective.unwrap_or_else(RoutingObjective::default_fairness);
        let request_id = Uuid::new_v4().to_string();
        let correlation_id = Uuid::new_v4().to_string();

        let decision = self.routing_engine.route_request(intent, objective).await?;
        let adapter = self.adapters.get(&decision.selected_provider_id)?;

        let mut candidate_key_ids = Vec::with_capacity(1 + decision.alternatives.len());
        candidate_key_ids.push(decision.selected_key_id.clone());
        candidate_key_ids.extend(decision.alternatives.iter().map(|a| a.key_id.clone()));

        let mut last_error: Option<SystemError> = None;

        for key_id in candidate_key_ids.into_iter().take(MAX_ATTEMPTS) {
            let key = self.key_manager.get_key(&key_id).await?;
            let estimate = adapter.estimate_cost(intent).await.ok();

            if let Some(cost_controller) = &self.cost_controller {
                if let Some(estimate) = &estimate {
                    if cost_controller
                        .enforce_budget(&decision.selected_provider_id, &key_id, None, estimate)
                        .is_err()
                    {
                        info!(key_id, "skipped: hard budget exceeded");
                        continue;
                    }
                    cost_controller.record_estimated_cost(
                        &decision.selected_provider_id,
                        &key_id,
                        None,
                        estimate,
                    );
                }
            }

            let credential = self.key_manager.get_material(&key_id).await?;
            let started = self.ctx.now();

            match adapter.execute_request(intent, &key, &credential).await {
                Ok(mut response) => {
                    self.key_manager.record_success(&key_id).await?;

                    if let Some(quota_engine) = &self.quota_engine {
                        let tokens = response.metadata.tokens_used.total() as u64;
                        quota_engine.update_capacity(&key_id, 1, Some(tokens)).await?;
                    }

                    if let (Some(cost_controller), Some(estimate)) = (&self.cost_controller, &estimate) {
                        if let Some(actual) = &response.cost {
                            let reconciliation = cost_controller.record_actual_cost(
                                request_id.clone(),
                                &decision.selected_provider_id,
                                &key_id,
                                None,
                                estimate.amount,
                                actual.amount,
                            );
                            info!(
                                request_id = %reconciliation.request_id,
                                delta = %reconciliation.delta,
                                "cost_reconciled"
                            );
                        }
                    }

                    response.request_id = request_id.clone();
                    response.key_used = key_id.clone();
                    response.metadata.request_id = request_id.clone();
                    response.metadata.correlation_id = correlation_id.clone();
                    response.metadata.response_time_ms =
                        (self.ctx.now() - started).num_milliseconds().max(0) as u64;

                    info!(
                        request_id = %request_id,
                        key_id,
                        provider_id = %decision.selected_provider_id,
                        response_time_ms = response.metadata.response_time_ms,
                        "request_completed"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    self.key_manager.record_failure(&key_id).await?;

                    if err.category == ErrorCategory::RateLimit {
                        let cooldown = err.retry_after_secs.map(chrono::Duration::seconds);
                        if let Err(transition_err) = self
                            .key_manager
                            .update_state(&key_id, KeyState::Throttled, "rate_limited", cooldown, Default::default())
                            .await
                        {
                            warn!(key_id, error = %transition_err, "failed to transition key to throttled");
                        }
                    }

                    let retryable = err.retryable;
                    warn!(key_id, retryable, category = ?err.category, "provider_call_failed");
                    last_error = Some(err);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let final_error = last_error.unwrap_or_else(|| {
            SystemError::new(ErrorCategory::Unknown, "no eligible key produced a response")
        });
        warn!(
            request_id = %request_id,
            provider_id = %decision.selected_provider_id,
            category = ?final_error.category,
            "request_failed"
        );
        Err(OrchestratorError::Provider(final_error))
    }

    /// Spawn the background recovery task that periodically calls
    /// `KeyManager::check_and_recover`. Callers are responsible for spawning
    /// at most one of these per process; the returned handle cancels it.
    pub fn spawn_recovery_task(self: Arc<Self>, interval: Duration) -> RecoveryHandle {
        let stop = Arc::new(Notify::new());
        let stop_signal = stop.clone();
        let orchestrator = self;

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        match orchestrator.key_manager.check_and_recover().await {
                            Ok(recovered) if !recovered.is_empty() => {
                                info!(count = recovered.len(), "keys_recovered");
                            }
                            Ok(_) => {}
                            Err(err) => warn!(error = %err, "recovery_scan_failed"),
                        }

                        if let Some(redis_store) = &orchestrator.redis_store {
                            let reclaimed = redis_store.reconcile_orphans();
                            if reclaimed > 0 {
                                info!(reclaimed, "reconciled orphaned redis-like store entries");
                            }
                        }
                    }
                    _ = stop_signal.notified() => break,
                }
            }
        });

        RecoveryHandle { stop, task }
    }
}

/// Handle to a running recovery task. Dropping it leaves the task running;
/// call `stop()` to cancel it.
pub struct RecoveryHandle {
    stop: Arc<Notify>,
    task: JoinHandle<()>,
}

impl RecoveryHandle {
    pub fn stop(self) {
        self.stop.notify_one();
        self.task.abort();
    }
}
