//! Redis-like `StateStore` backing: namespaced keys, per-entry TTL, and
//! bounded lists for transitions — the same shape as a real Redis-backed
//! store, minus the network hop. Ships as a standalone in-memory fake here;
//! a production deployment would point `RedisLikeStateStore` at an actual
//! `redis` client behind the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use super::error::StateStoreError;
use super::model::StateTransition;
use super::query::{QueryResult, StateQuery};
use super::StateStore;
use crate::clock::Clock;
use crate::key::model::{Key, KeyView};
use crate::quota::model::QuotaState;
use crate::routing::decision::RoutingDecision;

pub const DEFAULT_KEY_TTL_DAYS: i64 = 7;
pub const DEFAULT_DECISION_TTL_HOURS: i64 = 24;
const DEFAULT_MAX_TRANSITIONS: usize = 1000;

struct TtlEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// Namespaced, TTL-bearing in-memory store mirroring a Redis deployment's
/// key patterns: `apikey:{id}`, `quota:{key_id}`, `decision:{correlation_id}`,
/// `transitions:{key_id}` (bounded list).
pub struct RedisLikeStateStore {
    keys: DashMap<String, TtlEntry<Key>>,
    quota_states: DashMap<String, TtlEntry<QuotaState>>,
    decisions: DashMap<String, TtlEntry<RoutingDecision>>,
    transitions: DashMap<String, VecDeque<StateTransition>>,
    key_ttl: Duration,
    decision_ttl: Duration,
    max_transitions: usize,
    clock: Arc<dyn Clock>,
}

impl RedisLikeStateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: DashMap::new(),
            quota_states: DashMap::new(),
            decisions: DashMap::new(),
            transitions: DashMap::new(),
            key_ttl: Duration::days(DEFAULT_KEY_TTL_DAYS),
            decision_ttl: Duration::hours(DEFAULT_DECISION_TTL_HOURS),
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            clock,
        }
    }

    pub fn with_ttls(
        clock: Arc<dyn Clock>,
        key_ttl: Duration,
        decision_ttl: Duration,
        max_transitions: usize,
    ) -> Self {
        Self {
            keys: DashMap::new(),
            quota_states: DashMap::new(),
            decisions: DashMap::new(),
            transitions: DashMap::new(),
            key_ttl,
            decision_ttl,
            max_transitions,
            clock,
        }
    }

    fn is_expired(&self, expires_at: DateTime<Utc>) -> bool {
        self.clock.now() > expires_at
    }

    /// Sweep TTL-expired entries out of every map. `list_keys`/`query_state`
    /// already filter expired entries out of their results, but leave the
    /// dead rows in place until something writes over them; this reclaims
    /// that orphaned memory and gives the recovery task a periodic hook to
    /// do it on a schedule rather than relying on read-path eviction alone.
    pub fn reconcile_orphans(&self) -> usize {
        let now = self.clock.now();
        let mut reclaimed = 0;

        self.keys.retain(|_, entry| {
            let keep = entry.expires_at >= now;
            if !keep {
                reclaimed += 1;
            }
            keep
        });
        self.quota_states.retain(|_, entry| {
            let keep = entry.expires_at >= now;
            if !keep {
                reclaimed += 1;
            }
            keep
        });
        self.decisions.retain(|_, entry| {
            let keep = entry.expires_at >= now;
            if !keep {
                reclaimed += 1;
            }
            keep
        });

        reclaimed
    }
}

#[async_trait]
impl StateStore for RedisLikeStateStore {
    async fn save_key(&self, key: &Key) -> Result<(), StateStoreError> {
        self.keys.insert(
            key.id.clone(),
            TtlEntry {
                value: key.clone(),
                expires_at: self.clock.now() + self.key_ttl,
            },
        );
        Ok(())
    }

    async fn get_key(&self, id: &str) -> Result<Option<Key>, StateStoreError> {
        match self.keys.get(id) {
            Some(entry) if !self.is_expired(entry.expires_at) => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.keys.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn list_keys(&self, provider_id: Option<&str>) -> Result<Vec<Key>, StateStoreError> {
        let now = self.clock.now();
        Ok(self
            .keys
            .iter()
            .filter(|entry| entry.expires_at >= now)
            .map(|entry| entry.value.value.clone())
            .filter(|k| provider_id.is_none_or(|p| k.provider_id == p))
            .collect())
    }

    async fn save_quota_state(&self, state: &QuotaState) -> Result<(), StateStoreError> {
        self.quota_states.insert(
            state.key_id.clone(),
            TtlEntry {
                value: state.clone(),
                expires_at: self.clock.now() + self.key_ttl,
            },
        );
        Ok(())
    }

    async fn get_quota_state(&self, key_id: &str) -> Result<Option<QuotaState>, StateStoreError> {
        match self.quota_states.get(key_id) {
            Some(entry) if !self.is_expired(entry.expires_at) => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.quota_states.remove(key_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save_routing_decision(
        &self,
        decision: &RoutingDecision,
    ) -> Result<(), StateStoreError> {
        let correlation_id = if decision.id.is_empty() {
            decision.request_id.clone()
        } else {
            decision.id.clone()
        };
        self.decisions.insert(
            correlation_id,
            TtlEntry {
                value: decision.clone(),
                expires_at: self.clock.now() + self.decision_ttl,
            },
        );
        Ok(())
    }

    async fn save_state_transition(
        &self,
        transition: &StateTransition,
    ) -> Result<(), StateStoreError> {
        let mut list = self
            .transitions
            .entry(transition.entity_id.clone())
            .or_default();
        list.push_front(transition.clone());
        while list.len() > self.max_transitions {
            list.pop_back();
        }
        Ok(())
    }

    async fn update_key(
        &self,
        id: &str,
        mutator: Box<dyn FnOnce(&mut Key) + Send>,
    ) -> Result<Key, StateStoreError> {
        let now = self.clock.now();
        let mut entry = self
            .keys
            .get_mut(id)
            .ok_or_else(|| StateStoreError::NotFound(id.to_string()))?;
        if self.is_expired(entry.expires_at) {
            drop(entry);
            self.keys.remove(id);
            return Err(StateStoreError::NotFound(id.to_string()));
        }
        mutator(&mut entry.value);
        entry.expires_at = now + self.key_ttl;
        Ok(entry.value.clone())
    }

    async fn update_quota_state(
        &self,
        key_id: &str,
        default: QuotaState,
        mutator: Box<dyn FnOnce(&mut QuotaState) + Send>,
    ) -> Result<QuotaState, StateStoreError> {
        let now = self.clock.now();
        let mut entry = self.quota_states.entry(key_id.to_string()).or_insert_with(|| TtlEntry {
            value: default,
            expires_at: now + self.key_ttl,
        });
        if self.is_expired(entry.expires_at) {
            entry.value = QuotaState::new_default(
                entry.value.id.clone(),
                key_id.to_string(),
                entry.value.window,
                now,
            );
        }
        mutator(&mut entry.value);
        entry.expires_at = now + self.key_ttl;
        Ok(entry.value.clone())
    }

    async fn query_state(&self, query: &StateQuery) -> Result<Vec<QueryResult>, StateStoreError> {
        use super::model::EntityType;
        let now = self.clock.now();
        let mut results = Vec::new();

        let want = |et: EntityType| query.entity_type.is_none_or(|q| q == et);

        if want(EntityType::Key) {
            for entry in self.keys.iter() {
                if entry.expires_at < now {
                    continue;
                }
                let key = &entry.value.value;
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
                if entry.expires_at < now {
                    continue;
                }
                let qs = &entry.value.value;
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
            for entry in self.decisions.iter() {
                if entry.expires_at < now {
                    continue;
                }
                let decision = &entry.value.value;
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
                results.push(QueryResult::RoutingDecision(decision.clone()));
            }
        }

        if query.entity_type.is_none() {
            for entry in self.transitions.iter() {
                for transition in entry.value().iter() {
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
                    results.push(QueryResult::StateTransition(transition.clone()));
                }
            }
        }

        Ok(query.paginate(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::crypto::EncryptedMaterial;
    use crate::key::model::KeyState;

    fn store_at(start: DateTime<Utc>) -> (RedisLikeStateStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(start));
        (RedisLikeStateStore::new(clock.clone()), clock)
    }

    fn sample_key(id: &str) -> Key {
        Key {
            id: id.to_string(),
            material: EncryptedMaterial::from_bytes(vec![9]),
            provider_id: "openai".to_string(),
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
    async fn key_expires_after_ttl() {
        let start = Utc::now();
        let (store, clock) = store_at(start);
        store.save_key(&sample_key("k1")).await.unwrap();
        assert!(store.get_key("k1").await.unwrap().is_some());

        clock.advance(Duration::days(DEFAULT_KEY_TTL_DAYS + 1));
        assert!(store.get_key("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transitions_list_is_bounded_and_most_recent_first() {
        let (store, _clock) = store_at(Utc::now());
        let store = RedisLikeStateStore::with_ttls(
            store.clock.clone(),
            Duration::days(7),
            Duration::hours(24),
            3,
        );
        for i in 0..5 {
            let transition = StateTransition::new(
                format!("t{i}"),
                super::super::model::EntityType::Key,
                "k1".to_string(),
                "available",
                "throttled",
                Utc::now(),
                "rate_limit",
                Default::default(),
            );
            store.save_state_transition(&transition).await.unwrap();
        }
        let list = store.transitions.get("k1").unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.front().unwrap().id, "t4");
    }
}
