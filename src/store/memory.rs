//! In-memory `StateStore` backing: `DashMap`-based storage (the teacher's
//! `registry::Registry` pattern) with FIFO-capped append-only logs for
//! decisions and transitions.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::error::StateStoreError;
use super::model::{EntityType, StateTransition};
use super::query::{QueryResult, StateQuery};
use super::StateStore;
use crate::key::model::{Key, KeyView};
use crate::quota::model::QuotaState;
use crate::routing::decision::RoutingDecision;

const DEFAULT_CAP: usize = 1000;

/// In-memory backing. `cap == 0` means unlimited (spec §4.8).
pub struct InMemoryStateStore {
    keys: DashMap<String, Key>,
    quota_states: DashMap<String, QuotaState>,
    decisions: Mutex<VecDeque<RoutingDecision>>,
    transitions: Mutex<VecDeque<StateTransition>>,
    decision_cap: usize,
    transition_cap: usize,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAP, DEFAULT_CAP)
    }
}

impl InMemoryStateStore {
    pub fn new(decision_cap: usize, transition_cap: usize) -> Self {
        Self {
            keys: DashMap::new(),
            quota_states: DashMap::new(),
            decisions: Mutex::new(VecDeque::new()),
            transitions: Mutex::new(VecDeque::new()),
            decision_cap,
            transition_cap,
        }
    }

    fn push_capped<T>(queue: &mut VecDeque<T>, item: T, cap: usize) {
        queue.push_back(item);
        if cap != 0 {
            while queue.len() > cap {
                queue.pop_front();
            }
        }
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save_key(&self, key: &Key) -> Result<(), StateStoreError> {
        self.keys.insert(key.id.clone(), key.clone());
        Ok(())
    }

    async fn get_key(&self, id: &str) -> Result<Option<Key>, StateStoreError> {
        Ok(self.keys.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_keys(&self, provider_id: Option<&str>) -> Result<Vec<Key>, StateStoreError> {
        Ok(self
            .keys
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|k| provider_id.is_none_or(|p| k.provider_id == p))
            .collect())
    }

    async fn save_quota_state(&self, state: &QuotaState) -> Result<(), StateStoreError> {
        self.quota_states
            .insert(state.key_id.clone(), state.clone());
        Ok(())
    }

    async fn get_quota_state(&self, key_id: &str) -> Result<Option<QuotaState>, StateStoreError> {
        Ok(self
            .quota_states
            .get(key_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save_routing_decision(
        &self,
        decision: &RoutingDecision,
    ) -> Result<(), StateStoreError> {
        let mut decisions = self
            .decisions
            .lock()
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        Self::push_capped(&mut decisions, decision.clone(), self.decision_cap);
        Ok(())
    }

    async fn save_state_transition(
        &self,
        transition: &StateTransition,
    ) -> Result<(), StateStoreError> {
        let mut transitions = self
            .transitions
            .lock()
            .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
        Self::push_capped(&mut transitions, transition.clone(), self.transition_cap);
        Ok(())
    }

    async fn update_key(
        &self,
        id: &str,
        mutator: Box<dyn FnOnce(&mut Key) + Send>,
    ) -> Result<Key, StateStoreError> {
        let mut entry = self
            .keys
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
        let mut results = Vec::new();

        let want = |et: EntityType| query.entity_type.is_none_or(|q| q == et);

        if want(EntityType::Key) {
            for entry in self.keys.iter() {
                let key = entry.value();
                if let Some(p) = &query.provider_id {
                    if &key.provider_id != p {
                        continue;
                    }
                }
                if let Some(s) = query.state {
                    if key.state != s {
                        continue;
                    }
                }
                if let Some(kid) = &query.key_id {
                    if &key.id != kid {
                        continue;
                    }
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
                if let Some(kid) = &query.key_id {
                    if &qs.key_id != kid {
                        continue;
                    }
                }
                if !query.matches_timestamp(qs.updated_at) {
                    continue;
                }
                results.push(QueryResult::QuotaState(qs.clone()));
            }
        }

        if want(EntityType::RoutingDecision) {
            let decisions = self
                .decisions
                .lock()
                .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
            for decision in decisions.iter() {
                if let Some(kid) = &query.key_id {
                    if &decision.selected_key_id != kid {
                        continue;
                    }
                }
                if let Some(p) = &query.provider_id {
                    if &decision.selected_provider_id != p {
                        continue;
                    }
                }
                if !query.matches_timestamp(decision.decision_timestamp) {
                    continue;
                }
                results.push(QueryResult::RoutingDecision(decision.clone()));
            }
        }

        if query.entity_type.is_none()
            || matches!(
                query.entity_type,
                Some(EntityType::Key) | Some(EntityType::Budget)
            )
        {
            let transitions = self
                .transitions
                .lock()
                .map_err(|e| StateStoreError::Unavailable(e.to_string()))?;
            for transition in transitions.iter() {
                if let Some(kid) = &query.key_id {
                    if &transition.entity_id != kid {
                        continue;
                    }
                }
                if !query.matches_timestamp(transition.transition_timestamp) {
                    continue;
                }
                results.push(QueryResult::StateTransition(transition.clone()));
            }
        }

        Ok(query.paginate(results))
    }
}
