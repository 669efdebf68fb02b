//! State Store abstraction: the durable backing for keys, quota states,
//! routing decisions, and state transitions (spec §4.8).
//!
//! Multiple backings implement the same trait: an in-memory store (FIFO
//! caps), a Redis-like KV store (per-entry TTL + bounded lists), and a
//! document store (declared indexes). The Routing Engine and Orchestrator
//! depend only on the trait.

pub mod document;
pub mod error;
pub mod memory;
pub mod model;
pub mod query;
pub mod redis_like;

pub use error::StateStoreError;
pub use model::{EntityType, StateTransition};
pub use query::{QueryResult, StateQuery};

use async_trait::async_trait;

use crate::key::model::Key;
use crate::quota::model::QuotaState;
use crate::routing::decision::RoutingDecision;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn save_key(&self, key: &Key) -> Result<(), StateStoreError>;
    async fn get_key(&self, id: &str) -> Result<Option<Key>, StateStoreError>;
    async fn list_keys(&self, provider_id: Option<&str>) -> Result<Vec<Key>, StateStoreError>;

    async fn save_quota_state(&self, state: &QuotaState) -> Result<(), StateStoreError>;
    async fn get_quota_state(&self, key_id: &str) -> Result<Option<QuotaState>, StateStoreError>;

    async fn save_routing_decision(&self, decision: &RoutingDecision) -> Result<(), StateStoreError>;
    async fn save_state_transition(&self, transition: &StateTransition) -> Result<(), StateStoreError>;

    async fn query_state(&self, query: &StateQuery) -> Result<Vec<QueryResult>, StateStoreError>;

    /// Atomically read-modify-write a key's record: `mutator` runs under the
    /// same lock that guards the read, so concurrent callers never clobber
    /// each other's updates. `NotFound` if no record exists for `id`.
    async fn update_key(
        &self,
        id: &str,
        mutator: Box<dyn FnOnce(&mut Key) + Send>,
    ) -> Result<Key, StateStoreError>;

    /// Atomically read-modify-write a key's quota state, creating it from
    /// `default` first if absent. Same locking guarantee as `update_key`.
    async fn update_quota_state(
        &self,
        key_id: &str,
        default: QuotaState,
        mutator: Box<dyn FnOnce(&mut QuotaState) + Send>,
    ) -> Result<QuotaState, StateStoreError>;
}
