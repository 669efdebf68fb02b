//! Quota Awareness Engine: tracks per-key remaining capacity, derives
//! capacity state from thresholds, and biases routing scores toward keys
//! with more headroom.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::error::QuotaError;
use super::model::{
    CapacityState, CapacityTrack, EstimationMethod, PredictionConfidence, QuotaState, TimeWindow,
};
use crate::clock::Context;
use crate::key::model::Key;
use crate::store::StateStore;

/// Score multiplier applied per capacity state (spec §4.2). Exhausted keys
/// never reach this stage — they are filtered out beforehand.
fn multiplier_for(state: CapacityState) -> f64 {
    match state {
        CapacityState::Abundant => 1.20,
        CapacityState::Constrained => 0.85,
        CapacityState::Critical => 0.70,
        CapacityState::Recovering => 0.50,
        CapacityState::Exhausted => 0.0,
    }
}

/// Requests the Key Manager transition a key to `Exhausted` once its quota
/// crosses the threshold. Kept as an injected trait (rather than a direct
/// dependency on the Key Manager type) so the engine stays unit-testable and
/// the dependency direction between components stays one-way.
#[async_trait]
pub trait ExhaustionNotifier: Send + Sync {
    async fn notify_exhausted(&self, key_id: &str) -> Result<(), QuotaError>;
}

/// A predicted exhaustion instant, with a confidence bucket (spec §4.2).
#[derive(Debug, Clone)]
pub struct ExhaustionPrediction {
    pub key_id: String,
    pub predicted_at: Option<DateTime<Utc>>,
    pub confidence: PredictionConfidence,
}

pub struct QuotaEngine {
    store: Arc<dyn StateStore>,
    ctx: Context,
    default_window: TimeWindow,
    notifier: Option<Arc<dyn ExhaustionNotifier>>,
}

impl QuotaEngine {
    pub fn new(store: Arc<dyn StateStore>, ctx: Context, default_window: TimeWindow) -> Self {
        Self {
            store,
            ctx,
            default_window,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ExhaustionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Lazily creates a default `Abundant` state on first reference. Resets
    /// the window if `now >= reset_at`.
    pub async fn get_quota_state(&self, key_id: &str) -> Result<QuotaState, QuotaError> {
        let now = self.ctx.now();
        let existing = self.store.get_quota_state(key_id).await?;

        let state = match existing {
            Some(mut state) if now >= state.reset_at => {
                state.requests = CapacityTrack::new_unknown();
                state.tokens = state.tokens.as_ref().map(|_| CapacityTrack::new_unknown());
                state.reset_at = now + state.window.duration();
                state.capacity_state = CapacityState::Abundant;
                state.updated_at = now;
                self.store.save_quota_state(&state).await?;
                state
            }
            Some(state) => state,
            None => {
                let state = QuotaState::new_default(
                    self.ctx.next_id(),
                    key_id.to_string(),
                    self.default_window,
                    now,
                );
                self.store.save_quota_state(&state).await?;
                state
            }
        };
        Ok(state)
    }

    /// Atomically increments used/consumed counters, recomputes the capacity
    /// state, and — on crossing to `Exhausted` — notifies the Key Manager.
    ///
    /// The whole read-reset-increment-rederive sequence runs under the
    /// store's per-key lock via `update_quota_state`, so two concurrent
    /// requests against the same key never race on a stale read.
    pub async fn update_capacity(
        &self,
        key_id: &str,
        consumed_requests: u64,
        consumed_tokens: Option<u64>,
    ) -> Result<QuotaState, QuotaError> {
        let now = self.ctx.now();
        let default =
            QuotaState::new_default(self.ctx.next_id(), key_id.to_string(), self.default_window, now);

        let previous_state_slot = Arc::new(std::sync::Mutex::new(CapacityState::Abundant));
        let previous_state_slot_inner = previous_state_slot.clone();

        let state = self
            .store
            .update_quota_state(
                key_id,
                default,
                Box::new(move |state: &mut QuotaState| {
                    if now >= state.reset_at {
                        state.requests = CapacityTrack::new_unknown();
                        state.tokens = state.tokens.as_ref().map(|_| CapacityTrack::new_unknown());
                        state.reset_at = now + state.window.duration();
                        state.capacity_state = CapacityState::Abundant;
                    }
                    *previous_state_slot_inner.lock().unwrap() = state.capacity_state;

                    state.requests.used += consumed_requests;
                    if let Some(total) = state.requests.total {
                        let remaining = total.saturating_sub(state.requests.used);
                        state.requests.remaining = super::model::CapacityEstimate::Exact {
                            value: remaining,
                            confidence: state.requests.remaining.confidence(),
                            method: EstimationMethod::Heuristic,
                            last_verified: Some(now),
                        };
                    }

                    if let Some(tokens_used) = consumed_tokens {
                        let tokens = state.tokens.get_or_insert_with(CapacityTrack::new_unknown);
                        tokens.used += tokens_used;
                        if let Some(total) = tokens.total {
                            let remaining = total.saturating_sub(tokens.used);
                            tokens.remaining = super::model::CapacityEstimate::Exact {
                                value: remaining,
                                confidence: tokens.remaining.confidence(),
                                method: EstimationMethod::Heuristic,
                                last_verified: Some(now),
                            };
                        }
                    }

                    state.capacity_state = state.derive_capacity_state();
                    state.updated_at = now;
                }),
            )
            .await?;

        let previous_state = *previous_state_slot.lock().unwrap();

        if state.capacity_state != previous_state {
            tracing::info!(
                key_id,
                from = %previous_state_label(previous_state),
                to = %previous_state_label(state.capacity_state),
                "quota_state_changed"
            );
        }

        if state.capacity_state == CapacityState::Exhausted
            && previous_state != CapacityState::Exhausted
        {
            if let Some(notifier) = &self.notifier {
                notifier.notify_exhausted(key_id).await?;
            }
        }

        Ok(state)
    }

    /// Drops Exhausted keys. Returns the surviving keys, a map of quota
    /// states by key id, and the filtered-out keys (for explanation).
    pub async fn filter_by_quota_state(
        &self,
        keys: Vec<Key>,
    ) -> Result<(Vec<Key>, HashMap<String, QuotaState>, Vec<Key>), QuotaError> {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        let mut states = HashMap::new();

        for key in keys {
            let state = self.get_quota_state(&key.id).await?;
            if state.capacity_state == CapacityState::Exhausted {
                dropped.push(key);
            } else {
                states.insert(key.id.clone(), state);
                kept.push(key);
            }
        }
        Ok((kept, states, dropped))
    }

    /// Multiplies each score in place by the capacity-state multiplier.
    pub fn apply_quota_multipliers(
        &self,
        scores: &mut HashMap<String, f64>,
        quota_states: &HashMap<String, QuotaState>,
    ) {
        for (key_id, score) in scores.iter_mut() {
            if let Some(state) = quota_states.get(key_id) {
                *score *= multiplier_for(state.capacity_state);
            }
        }
    }

    /// Projects a usage rate from consumption-so-far over the elapsed window
    /// and divides remaining capacity by it. Raises the capacity state to
    /// Critical when the predicted exhaustion instant lands before the
    /// window resets and confidence is at least Medium.
    pub async fn predict_exhaustion(
        &self,
        key_id: &str,
    ) -> Result<ExhaustionPrediction, QuotaError> {
        let mut state = self.get_quota_state(key_id).await?;
        let now = self.ctx.now();

        let window_start = state.reset_at - state.window.duration();
        let elapsed_hours = (now - window_start).num_seconds().max(1) as f64 / 3600.0;

        let used = state.requests.used;
        let remaining = state
            .requests
            .remaining
            .numeric()
            .unwrap_or_else(|| state.requests.total.unwrap_or(0).saturating_sub(used));

        if used == 0 || elapsed_hours <= 0.0 {
            return Ok(ExhaustionPrediction {
                key_id: key_id.to_string(),
                predicted_at: None,
                confidence: PredictionConfidence::Unknown,
            });
        }

        let rate_per_hour = used as f64 / elapsed_hours;
        if rate_per_hour <= 0.0 {
            return Ok(ExhaustionPrediction {
                key_id: key_id.to_string(),
                predicted_at: None,
                confidence: PredictionConfidence::Unknown,
            });
        }

        let hours_to_exhaustion = remaining as f64 / rate_per_hour;
        let predicted_at = now + chrono::Duration::seconds((hours_to_exhaustion * 3600.0) as i64);

        let confidence = if state.requests.total.is_some() && elapsed_hours >= 1.0 {
            PredictionConfidence::High
        } else if state.requests.total.is_some() {
            PredictionConfidence::Medium
        } else {
            PredictionConfidence::Low
        };

        if predicted_at < state.reset_at
            && matches!(confidence, PredictionConfidence::Medium | PredictionConfidence::High)
            && state.capacity_state == CapacityState::Constrained
        {
            state.capacity_state = CapacityState::Critical;
            state.updated_at = now;
            self.store.save_quota_state(&state).await?;
        }

        Ok(ExhaustionPrediction {
            key_id: key_id.to_string(),
            predicted_at: Some(predicted_at),
            confidence,
        })
    }
}

fn previous_state_label(state: CapacityState) -> &'static str {
    match state {
        CapacityState::Abundant => "abundant",
        CapacityState::Constrained => "constrained",
        CapacityState::Critical => "critical",
        CapacityState::Exhausted => "exhausted",
        CapacityState::Recovering => "recovering",
    }
}
