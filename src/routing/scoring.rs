//! Per-objective raw scorers and the normalization they share (spec §4.5).
//! Strategies in `strategies.rs` combine these into a final `[0,1]` score per
//! key; this module owns only the math.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::key::model::{Key, KeyState};
use crate::quota::model::{CapacityState, QuotaState};

/// Rescale raw scores so the best candidate is 1.0 and the worst is 0.0. All
/// keys tie at 1.0 when every raw score is equal (avoids a division by zero
/// and matches "no candidate is worse than another" semantics).
pub fn normalize(raw: &HashMap<String, f64>) -> HashMap<String, f64> {
    if raw.is_empty() {
        return HashMap::new();
    }
    let min = raw.values().cloned().fold(f64::INFINITY, f64::min);
    let max = raw.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return raw.keys().map(|k| (k.clone(), 1.0)).collect();
    }
    raw.iter()
        .map(|(k, v)| (k.clone(), (v - min) / (max - min)))
        .collect()
}

/// Raw cost score: inversely proportional to estimated per-request cost.
/// Uses `costs` (adapter estimate or metadata hint) when present, else a
/// uniform default of 1.0 for every key (no preference without data).
pub fn cost_raw_scores(keys: &[Key], costs: &HashMap<String, Decimal>) -> HashMap<String, f64> {
    keys.iter()
        .map(|k| {
            let cost = costs.get(&k.id).and_then(|d| d.to_string().parse::<f64>().ok());
            let raw = match cost {
                Some(c) if c > 0.0 => 1.0 / c,
                Some(_) => 1.0,
                None => 1.0,
            };
            (k.id.clone(), raw)
        })
        .collect()
}

fn key_state_bonus(state: KeyState) -> f64 {
    match state {
        KeyState::Available => 1.0,
        KeyState::Recovering => 0.85,
        // "Throttled-expired" keys only reach the strategy after the Key
        // Manager's eligibility filter, so any Throttled key seen here has
        // already cleared its cooldown.
        KeyState::Throttled => 0.7,
        KeyState::Exhausted | KeyState::Disabled | KeyState::Invalid => 0.0,
    }
}

fn quota_state_bonus(state: Option<CapacityState>) -> f64 {
    match state {
        Some(CapacityState::Abundant) => 0.20,
        Some(CapacityState::Constrained) => -0.15,
        Some(CapacityState::Critical) => -0.30,
        Some(CapacityState::Recovering) => -0.50,
        Some(CapacityState::Exhausted) | None => 0.0,
    }
}

/// Raw reliability score: success rate + key-state bonus + quota-state bonus,
/// combined additively before normalization (spec §4.5).
pub fn reliability_raw_scores(
    keys: &[Key],
    quota_states: &HashMap<String, QuotaState>,
) -> HashMap<String, f64> {
    keys.iter()
        .map(|k| {
            let success_rate = if k.usage_count == 0 {
                0.95
            } else {
                (k.usage_count.saturating_sub(k.failure_count)) as f64 / k.usage_count as f64
            };
            let state_bonus = key_state_bonus(k.state);
            let quota_bonus = quota_state_bonus(quota_states.get(&k.id).map(|q| q.capacity_state));
            (k.id.clone(), success_rate + state_bonus + quota_bonus)
        })
        .collect()
}

/// Raw fairness score: inversely proportional to a key's share of total pool
/// usage. A never-used key gets the maximum raw score.
pub fn fairness_raw_scores(keys: &[Key]) -> HashMap<String, f64> {
    let total: u64 = keys.iter().map(|k| k.usage_count).sum();
    if total == 0 {
        return keys.iter().map(|k| (k.id.clone(), 1.0)).collect();
    }
    keys.iter()
        .map(|k| {
            let share = k.usage_count as f64 / total as f64;
            (k.id.clone(), 1.0 - share)
        })
        .collect()
}

pub fn success_rate(key: &Key) -> f64 {
    if key.usage_count == 0 {
        0.95
    } else {
        (key.usage_count.saturating_sub(key.failure_count)) as f64 / key.usage_count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_spreads_best_to_one_worst_to_zero() {
        let mut raw = HashMap::new();
        raw.insert("a".to_string(), 10.0);
        raw.insert("b".to_string(), 5.0);
        raw.insert("c".to_string(), 0.0);
        let normalized = normalize(&raw);
        assert_eq!(normalized["a"], 1.0);
        assert_eq!(normalized["c"], 0.0);
        assert!((normalized["b"] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn normalize_ties_all_candidates_when_equal() {
        let mut raw = HashMap::new();
        raw.insert("a".to_string(), 3.0);
        raw.insert("b".to_string(), 3.0);
        let normalized = normalize(&raw);
        assert_eq!(normalized["a"], 1.0);
        assert_eq!(normalized["b"], 1.0);
    }
}
