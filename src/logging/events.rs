//! Audit event names emitted across the key lifecycle, cost, policy, quota,
//! and routing subsystems, plus the correlation id carried through a single
//! inbound request's retries.
//!
//! Kept as `&'static str` constants rather than an enum: `tracing` fields
//! take string values and an enum buys nothing extra here.

use std::fmt;

use uuid::Uuid;

pub const KEY_REGISTERED: &str = "key_registered";
pub const KEY_ACCESS: &str = "key_access";
pub const STATE_TRANSITION: &str = "state_transition";
pub const KEY_REVOKED: &str = "key_revoked";
pub const KEY_ROTATED: &str = "key_rotated";
pub const KEYS_RECOVERED: &str = "keys_recovered";
pub const BUDGET_CREATED: &str = "budget_created";
pub const BUDGET_THRESHOLD_CROSSED: &str = "budget_threshold_crossed";
pub const POLICY_UPDATED: &str = "policy_updated";
pub const QUOTA_STATE_CHANGED: &str = "quota_state_changed";
pub const ROUTING_DECISION_MADE: &str = "routing_decision_made";
pub const COST_RECONCILED: &str = "cost_reconciled";
pub const PROVIDER_CALL_FAILED: &str = "provider_call_failed";
pub const BUDGET_VIOLATION: &str = "budget_violation";
pub const CONFIGURATION_LOADED: &str = "configuration_loaded";
pub const CONFIGURATION_ROLLBACK: &str = "configuration_rollback";
pub const KEY_CONFIG_UPDATED: &str = "key_config_updated";
pub const PROVIDER_REGISTERED: &str = "provider_registered";
pub const REQUEST_COMPLETED: &str = "request_completed";
pub const REQUEST_FAILED: &str = "request_failed";

/// Identifier tying together every log line for one inbound request across
/// its retries and sub-calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.to_string()
    }
}
