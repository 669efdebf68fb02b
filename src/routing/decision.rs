//! Append-only routing decision audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::objective::RoutingObjective;

/// A candidate that was considered but not selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub key_id: String,
    pub provider_id: String,
    pub score: f64,
    pub reason_not_selected: String,
}

/// Final routing decision after pipeline evaluation. Append-only once
/// persisted to the State Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub id: String,
    pub request_id: String,
    pub selected_key_id: String,
    pub selected_provider_id: String,
    pub decision_timestamp: DateTime<Utc>,
    pub objective: RoutingObjective,
    pub eligible_key_ids: Vec<String>,
    pub scores: HashMap<String, f64>,
    pub explanation: String,
    pub confidence: f64,
    pub alternatives: Vec<Alternative>,
}

impl RoutingDecision {
    /// Invariant (spec §8 #3): selected key is in the eligible set and
    /// confidence is normalized.
    pub fn check_invariants(&self) -> bool {
        self.eligible_key_ids.contains(&self.selected_key_id)
            && (0.0..=1.0).contains(&self.confidence)
            && !self.explanation.is_empty()
    }
}
