//! Filter query supported by all `StateStore` backings.

use chrono::{DateTime, Utc};

use super::model::EntityType;
use crate::key::model::KeyState;

/// Filter for `StateStore::query_state`. Every field is optional; an unset
/// field does not constrain the result set. Timestamp bounds are evaluated
/// against each entity's natural timestamp field (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct StateQuery {
    pub entity_type: Option<EntityType>,
    pub key_id: Option<String>,
    pub provider_id: Option<String>,
    pub state: Option<KeyState>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl StateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_type = Some(entity_type);
        self
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_state(mut self, state: KeyState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_range(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn matches_timestamp(&self, ts: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if ts < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if ts > to {
                return false;
            }
        }
        true
    }

    /// Apply `limit`/`offset` to an already-filtered, already-ordered vector.
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0);
        let iter = items.into_iter().skip(offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Uniform result row returned by `query_state`, since the entity families
/// have different shapes.
#[derive(Debug, Clone)]
pub enum QueryResult {
    Key(crate::key::model::KeyView),
    QuotaState(crate::quota::model::QuotaState),
    RoutingDecision(crate::routing::decision::RoutingDecision),
    StateTransition(super::model::StateTransition),
}
