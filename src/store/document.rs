//! Document-store `StateStore` backing: modeled on a Mongo-shaped schema
//! with declared collection indexes. Ships as an in-memory fake — the
//! `DocumentStateStore` struct and trait impl are written so that swapping
//! the internal maps for a `mongodb::Collection<T>` per collection is a
//! drop-in change; the declared indexes below are exactly what a real
//! deployment would create on startup.
//!
//! Collections and indexes:
//!   - `api_keys`: compound (provider_id, state); (state, last_used_at desc)
//!   - `quota_states`: unique index on key_id; (reset_at)
//!   - `routing_decisions`: (selected_key_id); (selected_provider_id);
//!     (decision_timestamp)
//!   - `state_transitions`: (entity_id, transition_timestamp desc); (entity_type)

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;

use super::error::StateStoreError;
use super::model::StateTransition;
use super::query::{QueryResult, StateQuery};
use super::StateStore;
use crate::key::model::{Key, KeyView};
use crate::quota::model::QuotaState;
use crate::routing::decision::RoutingDecision;

/// Declares the indexes this backing expects a real document store to carry.
/// Exposed so an operator wiring a real MongoDB deployment knows what to
/// create; this in-memory fake enforces only the uniqueness constraint.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredIndexes;

impl DeclaredIndexes {
    pub const API_KEYS: &'static [&'static str] =
        &["(provider_id, state)", "(state, last_used_at desc)"];
    pub const QUOTA_STATES: &'static [&'static str] = &["unique(key_id)", "(reset_at)"];
    pub const ROUTING_DECISIONS: &'static [&'static str] = &[
        "(selected_key_id)",
        "(selected_provider_id)",
        "(decision_timestamp)",
    ];
    pub const STATE_TRANSITIONS: &'static [&'static str] =
        &["(entity_id, transition_timestamp desc)", "(entity_type)"];
}

#[derive(Default)]
pub struct DocumentStateStore {
    api_keys: DashMap<String, Key>,
    quota_states: DashMap<String, QuotaState>,
    routing_decisions: DashMap<String, RoutingDecision>,
    state_transitions: Mutex<Vec<StateTransition>>,
}

impl DocumentStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for DocumentStateStore {
    async fn save_key(&self, key: &Key) -> Result<(), StateStoreError> {
        self.api_keys.insert(key.id.clone(), key.clone());
        Ok(())
    }

    async fn get_key(&self, id: &str) -> Result<Option<Key>, StateStoreError> {
        Ok(self.api_keys.get(id).map(|e| e.value().clone()))
    }

    async fn list_keys(&self, provider_id: Option<&str>) -> Result<Vec<Key>, StateStoreError> {
        Ok(self
            .api_keys
            .iter()
            .map(|e| e.value().clone())
            .filter(|k| provider_id.is_none_or(|p| k.provider_id == p))
            .collect())
    }

    /// Enforces the `unique(key_id)` index declared on `quota_states`:
    /// upserts by `key_id`, never creates a second document for the same key.
    async fn save_quota_state(&self, state: &QuotaState) -> Result<(), StateStoreError> {
        self.quota_states
            .insert(state.key_id.clone(), state.clone());
        Ok(())
    }

    async fn get_quota_state(&self, key_id: &str) -> Result<Option<QuotaState>, StateStoreError> {
        Ok(self.quota_states.get(key_id).map(|e| e.value().clone()))
    }

    async fn save_routing_decision(
        &self,
        decision: &RoutingDecision,
    ) -> Result<(), StateStoreError> {
        self.routing_decisions
            .insert(decision.id.clone(), decision.clone());
        Ok(())
    }

    async fn save_state_transition(
        &self,
        transition: &StateTransition,
    ) -> Result<(), StateStoreError> {
        let mut transitions = self
            .state_transitions
            .lock()
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        transitions.push(transition.clone());
        Ok(())
    }

    async fn update_key(
        &self,
        id: &str,
        mutator: Box<dyn FnOnce(&mut Key) + Send>,
    ) -> Result<Key, StateStoreError> {
        let mut entry = self
            .api_keys
            .get_mut(id)
            .ok_or_else(|| StateStoreError::NotFound(id.to_string()))?;
        mutator(entry.value_mut());
        Ok(entry.value().clone())
    }

    async fn update_quota_state(
        &self,
        key_id: &str,
        default: QuotaState,
        mutator: Box<dyn FnOnce(&mut QuotaState) + Send>,
    ) -> Result<QuotaState, StateStoreError> {
        let mut entry = self.quota_states.entry(key_id.to_string()).or_insert(default);
        mutator(entry.value_mut());
        Ok(entry.value().clone())
    }

    async fn query_state(&self, query: &StateQuery) -> Result<Vec<QueryResult>, StateStoreError> {
        use super::model::EntityType;
        let mut results = Vec::new();

        let want = |et: EntityType| query.entity_type.is_none_or(|q| q == et);

        if want(EntityType::Key) {
            for entry in self.api_keys.iter() {
                let key = entry.value();
                if query.key_id.as_deref().is_some_and(|kid| kid != key.id) {
                    continue;
                }
                if query
                    .provider_id
                    .as_deref()
                    .is_some_and(|p| p != key.provider_id)
                {
                    continue;
                }
                if query.state.is_some_and(|s| s != key.state) {
                    continue;
                }
                if !query.matches_timestamp(key.created_at) {
                    continue;
                }
                results.push(QueryResult::Key(KeyView::from(key)));
            }
        }

        if want(EntityType::QuotaState) {
            for entry in self.quota_states.iter() {
                let qs = entry.value();
                if query.key_id.as_deref().is_some_and(|kid| kid != qs.key_id) {
                    continue;
                }
                if !query.matches_timestamp(qs.updated_at) {
                    continue;
                }
                results.push(QueryResult::QuotaState(qs.clone()));
            }
        }

        if want(EntityType::RoutingDecision) {
            // Ordered index simulation: sort by decision_timestamp descending,
            // matching the declared (decision_timestamp) index's natural scan order.
            let mut decisions: Vec<_> =
                self.routing_decisions.iter().map(|e| e.value().clone()).collect();
            decisions.sort_by(|a, b| b.decision_timestamp.cmp(&a.decision_timestamp));
            for decision in decisions {
                if query
                    .key_id
                    .as_deref()
                    .is_some_and(|kid| kid != decision.selected_key_id)
                {
                    continue;
                }
                if query
                    .provider_id
                    .as_deref()
                    .is_some_and(|p| p != decision.selected_provider_id)
                {
                    continue;
                }
                if !query.matches_timestamp(decision.decision_timestamp) {
                    continue;
                }
                results.push(QueryResult::RoutingDecision(decision));
            }
        }

        if query.entity_type.is_none() {
            let transitions = self
                .state_transitions
                .lock()
                .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
            let mut sorted: Vec<_> = transitions.clone();
            sorted.sort_by(|a, b| {
                a.entity_id
                    .cmp(&b.entity_id)
                    .then(b.transition_timestamp.cmp(&a.transition_timestamp))
            });
            for transition in sorted {
                if query
                    .key_id
                    .as_deref()
                    .is_some_and(|kid| kid != transition.entity_id)
                {
                    continue;
                }
                if !query.matches_timestamp(transition.transition_timestamp) {
                    continue;
                }
                results.push(QueryResult::StateTransition(transition));
            }
        }

        Ok(query.paginate(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::EncryptedMaterial;
    use crate::key::model::KeyState;
    use chrono::Utc;

    fn sample_key(id: &str) -> Key {
        Key {
            id: id.to_string(),
            material: EncryptedMaterial::from_bytes(vec![4]),
            provider_id: "anthropic".to_string(),
            state: KeyState::Available,
            last_state_change: Utc::now(),
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: 0,
            failure_count: 0,
            cooldown_until: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn quota_state_upsert_enforces_unique_key_id() {
        let store = DocumentStateStore::new();
        let now = Utc::now();
        let mut qs = QuotaState::new_default("q1".to_string(), "k1".to_string(), crate::quota::model::TimeWindow::Hourly, now);
        store.save_quota_state(&qs).await.unwrap();
        qs.id = "q2".to_string();
        store.save_quota_state(&qs).await.unwrap();

        assert_eq!(store.quota_states.len(), 1);
        let fetched = store.get_quota_state("k1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "q2");
    }

    #[tokio::test]
    async fn list_keys_reflects_all_saved_documents() {
        let store = DocumentStateStore::new();
        store.save_key(&sample_key("k1")).await.unwrap();
        store.save_key(&sample_key("k2")).await.unwrap();
        let keys = store.list_keys(None).await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn declared_indexes_cover_expected_query_paths() {
        assert!(DeclaredIndexes::QUOTA_STATES.contains(&"unique(key_id)"));
        assert!(DeclaredIndexes::API_KEYS.contains(&"(provider_id, state)"));
    }
}
