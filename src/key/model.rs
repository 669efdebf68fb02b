//! Key entity and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crypto::EncryptedMaterial;

/// Lifecycle state of an API key. See `VALID_TRANSITIONS` for the allowed
/// moves between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Available,
    Throttled,
    Exhausted,
    Recovering,
    Disabled,
    Invalid,
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KeyState::Available => "available",
            KeyState::Throttled => "throttled",
            KeyState::Exhausted => "exhausted",
            KeyState::Recovering => "recovering",
            KeyState::Disabled => "disabled",
            KeyState::Invalid => "invalid",
        };
        write!(f, "{s}")
    }
}

/// Returns whether `from -> to` is a legal transition per the state machine
/// in spec §4.1. `from == to` is always considered legal (a no-op).
pub fn is_valid_transition(from: KeyState, to: KeyState) -> bool {
    use KeyState::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Available, Throttled)
            | (Available, Exhausted)
            | (Available, Disabled)
            | (Available, Invalid)
            | (Throttled, Available)
            | (Throttled, Disabled)
            | (Throttled, Invalid)
            | (Exhausted, Recovering)
            | (Exhausted, Disabled)
            | (Exhausted, Invalid)
            | (Recovering, Available)
            | (Recovering, Exhausted)
            | (Recovering, Disabled)
            | (Recovering, Invalid)
            | (Disabled, Available)
            | (Disabled, Invalid)
            | (Invalid, Disabled)
    )
}

/// Metadata values allowed on a `Key`. Bounded to primitives or lists of
/// primitives by `crate::key::validation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<MetadataValue>),
    Map(HashMap<String, MetadataValue>),
}

pub type Metadata = HashMap<String, MetadataValue>;

/// One credential for one provider.
#[derive(Debug, Clone)]
pub struct Key {
    pub id: String,
    pub material: EncryptedMaterial,
    pub provider_id: String,
    pub state: KeyState,
    pub last_state_change: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub failure_count: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl Key {
    /// Invariant (spec §8 #1): Throttled iff cooldown_until is set.
    pub fn check_cooldown_invariant(&self) -> bool {
        (self.state == KeyState::Throttled) == self.cooldown_until.is_some()
    }
}

/// Serializable, non-secret view of a `Key` for audit/API surfaces. Never
/// includes key material, even encrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyView {
    pub id: String,
    pub provider_id: String,
    pub state: KeyState,
    pub last_state_change: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub failure_count: u64,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl From<&Key> for KeyView {
    fn from(key: &Key) -> Self {
        Self {
            id: key.id.clone(),
            provider_id: key.provider_id.clone(),
            state: key.state,
            last_state_change: key.last_state_change,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            usage_count: key.usage_count,
            failure_count: key.failure_count,
            cooldown_until: key.cooldown_until,
            metadata: key.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_spec_matrix() {
        use KeyState::*;
        // Spot-check a representative sample of the §4.1 table, including
        // disallowed entries.
        assert!(is_valid_transition(Available, Throttled));
        assert!(is_valid_transition(Available, Exhausted));
        assert!(!is_valid_transition(Available, Recovering));
        assert!(is_valid_transition(Throttled, Available));
        assert!(!is_valid_transition(Throttled, Exhausted));
        assert!(is_valid_transition(Exhausted, Recovering));
        assert!(!is_valid_transition(Exhausted, Available));
        assert!(is_valid_transition(Recovering, Available));
        assert!(is_valid_transition(Recovering, Exhausted));
        assert!(!is_valid_transition(Recovering, Throttled));
        assert!(is_valid_transition(Disabled, Available));
        assert!(!is_valid_transition(Disabled, Throttled));
        assert!(is_valid_transition(Invalid, Disabled));
        assert!(!is_valid_transition(Invalid, Available));
    }

    #[test]
    fn no_op_transition_always_valid() {
        for state in [
            KeyState::Available,
            KeyState::Throttled,
            KeyState::Exhausted,
            KeyState::Recovering,
            KeyState::Disabled,
            KeyState::Invalid,
        ] {
            assert!(is_valid_transition(state, state));
        }
    }
}
