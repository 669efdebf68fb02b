//! Append-only audit record for entity state transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::key::model::MetadataValue;

/// Which kind of entity a `StateTransition` or query filter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Key,
    QuotaState,
    Budget,
    RoutingDecision,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Key => "key",
            EntityType::QuotaState => "quota_state",
            EntityType::Budget => "budget",
            EntityType::RoutingDecision => "routing_decision",
        };
        write!(f, "{s}")
    }
}

/// Append-only audit record of an entity's state machine transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub from_state: String,
    pub to_state: String,
    pub transition_timestamp: DateTime<Utc>,
    pub trigger: String,
    pub context: HashMap<String, MetadataValue>,
}

impl StateTransition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        entity_type: EntityType,
        entity_id: String,
        from_state: impl Into<String>,
        to_state: impl Into<String>,
        transition_timestamp: DateTime<Utc>,
        trigger: impl Into<String>,
        context: HashMap<String, MetadataValue>,
    ) -> Self {
        Self {
            id,
            entity_type,
            entity_id,
            from_state: from_state.into(),
            to_state: to_state.into(),
            transition_timestamp,
            trigger: trigger.into(),
            context,
        }
    }
}
