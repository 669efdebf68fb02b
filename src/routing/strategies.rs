//! Routing strategies: pluggable per-objective key scorers (spec §4.5).

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::objective::{Objective, RoutingObjective};
use super::scoring::{self, normalize};
use crate::key::model::Key;
use crate::quota::model::QuotaState;

/// Shared tie-break: highest score wins; ties break by (1) lowest failure
/// count, (2) oldest `last_used_at` (never-used first), (3) lexicographic
/// key id. Deterministic given equal inputs. `last_selected` is accepted but
/// unused here — it only matters to `FairnessStrategy`'s round-robin
/// override below.
pub fn select_winner(scores: &HashMap<String, f64>, keys: &[Key]) -> (String, f64) {
    let best_score = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);

    let mut tied: Vec<&Key> = keys
        .iter()
        .filter(|k| scores.get(&k.id).copied().unwrap_or(f64::NEG_INFINITY) == best_score)
        .collect();

    tied.sort_by(|a, b| {
        a.failure_count
            .cmp(&b.failure_count)
            .then_with(|| match (a.last_used_at, b.last_used_at) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (Some(x), Some(y)) => x.cmp(&y),
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    let winner = tied.first().expect("non-empty key set");
    (winner.id.clone(), best_score)
}

/// Fairness-specific tie-break: among keys tied at the best score, pick the
/// one immediately after `last_selected` in stable key-id order, guaranteeing
/// no starvation. Falls back to the universal tie-break when there's no
/// `last_selected` or it isn't among the tied candidates.
fn select_winner_round_robin(
    scores: &HashMap<String, f64>,
    keys: &[Key],
    last_selected: Option<&str>,
) -> (String, f64) {
    let best_score = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);

    let mut ordered: Vec<&Key> = keys.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let tied_ids: std::collections::HashSet<&str> = ordered
        .iter()
        .filter(|k| scores.get(&k.id).copied().unwrap_or(f64::NEG_INFINITY) == best_score)
        .map(|k| k.id.as_str())
        .collect();

    if let Some(last_id) = last_selected {
        if let Some(pos) = ordered.iter().position(|k| k.id == last_id) {
            let rotated = ordered[pos + 1..].iter().chain(ordered[..=pos].iter());
            for candidate in rotated {
                if tied_ids.contains(candidate.id.as_str()) {
                    return (candidate.id.clone(), best_score);
                }
            }
        }
    }

    select_winner(scores, keys)
}

pub trait RoutingStrategy: Send + Sync {
    /// Normalized `[0,1]` score per key.
    fn score_keys(
        &self,
        keys: &[Key],
        costs: &HashMap<String, Decimal>,
        quota_states: &HashMap<String, QuotaState>,
    ) -> HashMap<String, f64>;

    fn select_key(
        &self,
        scores: &HashMap<String, f64>,
        keys: &[Key],
        _last_selected: Option<&str>,
    ) -> (String, f64) {
        select_winner(scores, keys)
    }

    fn generate_explanation(
        &self,
        selected_id: &str,
        scores: &HashMap<String, f64>,
        keys: &[Key],
        costs: &HashMap<String, Decimal>,
    ) -> String;
}

pub struct CostOptimizedStrategy;

impl RoutingStrategy for CostOptimizedStrategy {
    fn score_keys(
        &self,
        keys: &[Key],
        costs: &HashMap<String, Decimal>,
        _quota_states: &HashMap<String, QuotaState>,
    ) -> HashMap<String, f64> {
        normalize(&scoring::cost_raw_scores(keys, costs))
    }

    fn generate_explanation(
        &self,
        selected_id: &str,
        _scores: &HashMap<String, f64>,
        _keys: &[Key],
        costs: &HashMap<String, Decimal>,
    ) -> String {
        match costs.get(selected_id) {
            Some(cost) => format!("cost-optimized: selected {selected_id} at ${cost} per request"),
            None => format!("cost-optimized: selected {selected_id} (no cost estimate available)"),
        }
    }
}

pub struct ReliabilityOptimizedStrategy;

impl RoutingStrategy for ReliabilityOptimizedStrategy {
    fn score_keys(
        &self,
        keys: &[Key],
        _costs: &HashMap<String, Decimal>,
        quota_states: &HashMap<String, QuotaState>,
    ) -> HashMap<String, f64> {
        normalize(&scoring::reliability_raw_scores(keys, quota_states))
    }

    fn generate_explanation(
        &self,
        selected_id: &str,
        _scores: &HashMap<String, f64>,
        keys: &[Key],
        _costs: &HashMap<String, Decimal>,
    ) -> String {
        match keys.iter().find(|k| k.id == selected_id) {
            Some(key) => format!(
                "reliability-optimized: selected {selected_id}, success rate {:.2} ({} successes, {} failures)",
                scoring::success_rate(key),
                key.usage_count.saturating_sub(key.failure_count),
                key.failure_count
            ),
            None => format!("reliability-optimized: selected {selected_id}"),
        }
    }
}

pub struct FairnessStrategy;

impl RoutingStrategy for FairnessStrategy {
    fn score_keys(
        &self,
        keys: &[Key],
        _costs: &HashMap<String, Decimal>,
        _quota_states: &HashMap<String, QuotaState>,
    ) -> HashMap<String, f64> {
        normalize(&scoring::fairness_raw_scores(keys))
    }

    fn select_key(
        &self,
        scores: &HashMap<String, f64>,
        keys: &[Key],
        last_selected: Option<&str>,
    ) -> (String, f64) {
        select_winner_round_robin(scores, keys, last_selected)
    }

    fn generate_explanation(
        &self,
        selected_id: &str,
        _scores: &HashMap<String, f64>,
        keys: &[Key],
        _costs: &HashMap<String, Decimal>,
    ) -> String {
        match keys.iter().find(|k| k.id == selected_id) {
            Some(key) => format!(
                "fairness: selected {selected_id}, usage count {} (round-robin tie-break)",
                key.usage_count
            ),
            None => format!("fairness: selected {selected_id}"),
        }
    }
}

/// Weighted combination of the per-objective scorers above, one weight per
/// objective named in `RoutingObjective.weights` (or an equal split across
/// primary+secondary when weights are unset).
pub struct MultiObjectiveStrategy {
    pub objective: RoutingObjective,
}

impl MultiObjectiveStrategy {
    fn sub_scores(
        objective: Objective,
        keys: &[Key],
        costs: &HashMap<String, Decimal>,
        quota_states: &HashMap<String, QuotaState>,
    ) -> HashMap<String, f64> {
        match objective {
            Objective::Cost => normalize(&scoring::cost_raw_scores(keys, costs)),
            Objective::Reliability | Objective::Quality => {
                normalize(&scoring::reliability_raw_scores(keys, quota_states))
            }
            Objective::Fairness => normalize(&scoring::fairness_raw_scores(keys)),
            // Latency/Speed have no dedicated sub-scorer in this core
            // (provider adapters don't report per-key latency); fall back to
            // reliability, the closest available proxy.
            Objective::Latency | Objective::Speed => normalize(&scoring::reliability_raw_scores(keys, quota_states)),
        }
    }
}

impl RoutingStrategy for MultiObjectiveStrategy {
    fn score_keys(
        &self,
        keys: &[Key],
        costs: &HashMap<String, Decimal>,
        quota_states: &HashMap<String, QuotaState>,
    ) -> HashMap<String, f64> {
        let weights = self.objective.effective_weights();
        let mut combined: HashMap<String, f64> = keys.iter().map(|k| (k.id.clone(), 0.0)).collect();
        for (objective, weight) in weights {
            let sub = Self::sub_scores(objective, keys, costs, quota_states);
            for (key_id, score) in combined.iter_mut() {
                *score += weight * sub.get(key_id).copied().unwrap_or(0.0);
            }
        }
        normalize(&combined)
    }

    fn generate_explanation(
        &self,
        selected_id: &str,
        scores: &HashMap<String, f64>,
        _keys: &[Key],
        _costs: &HashMap<String, Decimal>,
    ) -> String {
        let weights = self.objective.effective_weights();
        let parts: Vec<String> = weights
            .iter()
            .map(|(o, w)| format!("{o:?}={w:.2}"))
            .collect();
        format!(
            "multi-objective ({}): selected {selected_id}, combined score {:.2}",
            parts.join(", "),
            scores.get(selected_id).copied().unwrap_or(0.0)
        )
    }
}

/// Choose the strategy implied by an objective: multi-objective when weights
/// or secondary objectives are present, else the single-objective scorer for
/// `objective.primary`.
pub fn strategy_for(objective: &RoutingObjective) -> Box<dyn RoutingStrategy> {
    if objective.is_multi_objective() {
        return Box::new(MultiObjectiveStrategy {
            objective: objective.clone(),
        });
    }
    match objective.primary {
        Objective::Cost => Box::new(CostOptimizedStrategy),
        Objective::Reliability | Objective::Quality | Objective::Latency | Objective::Speed => {
            Box::new(ReliabilityOptimizedStrategy)
        }
        Objective::Fairness => Box::new(FairnessStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::model::KeyState;
    use chrono::Utc;

    fn key(id: &str, usage: u64, failures: u64) -> Key {
        Key {
            id: id.to_string(),
            material: crate::crypto::EncryptedMaterial::from_bytes(vec![0u8; 16]),
            provider_id: "openai".to_string(),
            state: KeyState::Available,
            last_state_change: Utc::now(),
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: usage,
            failure_count: failures,
            cooldown_until: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn cost_optimized_prefers_cheapest_key() {
        let keys = vec![key("k1", 0, 0), key("k2", 0, 0), key("k3", 0, 0)];
        let mut costs = HashMap::new();
        costs.insert("k1".to_string(), "0.01".parse().unwrap());
        costs.insert("k2".to_string(), "0.02".parse().unwrap());
        costs.insert("k3".to_string(), "0.03".parse().unwrap());
        let strategy = CostOptimizedStrategy;
        let scores = strategy.score_keys(&keys, &costs, &HashMap::new());
        let (selected, _) = strategy.select_key(&scores, &keys, None);
        assert_eq!(selected, "k1");
    }

    #[test]
    fn tie_break_prefers_lower_failure_count_then_lexicographic_id() {
        let keys = vec![key("k2", 5, 1), key("k1", 5, 0)];
        let mut scores = HashMap::new();
        scores.insert("k1".to_string(), 1.0);
        scores.insert("k2".to_string(), 1.0);
        let (selected, _) = select_winner(&scores, &keys);
        assert_eq!(selected, "k1");
    }

    #[test]
    fn fairness_round_robin_picks_key_after_last_selected() {
        let keys = vec![key("k1", 5, 0), key("k2", 5, 0), key("k3", 5, 0)];
        let mut scores = HashMap::new();
        scores.insert("k1".to_string(), 1.0);
        scores.insert("k2".to_string(), 1.0);
        scores.insert("k3".to_string(), 1.0);
        let (selected, _) = select_winner_round_robin(&scores, &keys, Some("k1"));
        assert_eq!(selected, "k2");
    }
}
