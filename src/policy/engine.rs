//! Policy Engine (spec §4.4): pure evaluation, no side effects beyond
//! logging. Mirrors the Quota Engine's storage-free construction — policies
//! live in a `DashMap` here rather than the generic `StateStore`, same
//! reasoning as `CostController`'s budgets.

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use super::error::PolicyError;
use super::model::{Policy, PolicyContext, PolicyResult, PolicyRules, PolicyScope, PolicyType};
use crate::clock::Context;

pub struct PolicyEngine {
    policies: DashMap<String, Policy>,
    ctx: Context,
}

impl PolicyEngine {
    pub fn new(ctx: Context) -> Self {
        Self {
            policies: DashMap::new(),
            ctx,
        }
    }

    pub fn create_policy(
        &self,
        name: impl Into<String>,
        policy_type: PolicyType,
        scope: PolicyScope,
        scope_id: Option<String>,
        rules: PolicyRules,
        priority: i32,
    ) -> Result<Policy, PolicyError> {
        if scope != PolicyScope::Global && scope_id.is_none() {
            return Err(PolicyError::InvalidPolicy(
                "scope_id required when scope is not Global".to_string(),
            ));
        }
        let policy = Policy {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            policy_type,
            scope,
            scope_id,
            rules,
            priority,
            enabled: true,
            created_at: self.ctx.now(),
        };
        self.policies.insert(policy.id.clone(), policy.clone());
        info!(policy_id = %policy.id, "policy_updated");
        Ok(policy)
    }

    pub fn list_policies(&self) -> Vec<Policy> {
        self.policies.iter().map(|e| e.value().clone()).collect()
    }

    pub fn delete_policy(&self, policy_id: &str) -> Result<(), PolicyError> {
        self.policies
            .remove(policy_id)
            .map(|_| ())
            .ok_or_else(|| PolicyError::NotFound(policy_id.to_string()))
    }

    /// Enabled policies matching `scope`/`policy_type`/`scope_id`, ordered by
    /// descending priority then ascending creation time (deterministic
    /// tie-break, since `created_at` monotonically orders insertion here).
    pub fn get_applicable_policies(
        &self,
        scope: PolicyScope,
        policy_type: PolicyType,
        scope_id: Option<&str>,
    ) -> Vec<Policy> {
        let mut matches: Vec<Policy> = self
            .policies
            .iter()
            .map(|e| e.value().clone())
            .filter(|p| p.enabled && p.policy_type == policy_type)
            .filter(|p| p.applies_to_scope(scope, scope_id))
            .collect();
        matches.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));
        matches
    }

    /// Evaluate a single policy's rules against the candidate set. Candidates
    /// dropped by a filter rule appear in `filtered_keys`; candidates that
    /// survive every rule remain eligible.
    pub fn evaluate_policy(&self, policy: &Policy, context: &PolicyContext) -> PolicyResult {
        let rules = &policy.rules;
        let mut filtered = Vec::new();
        let mut constraints = super::model::PolicyConstraints {
            preferred_providers: rules.preferred_providers.clone(),
            preferred_regions: rules.preferred_regions.clone(),
            max_cost_per_request: rules.max_cost_per_request,
        };

        for candidate in &context.candidates {
            if rules.blocked_providers.contains(&candidate.provider_id) {
                filtered.push(candidate.key_id.clone());
                continue;
            }
            if let Some(region) = &candidate.region {
                if rules.blocked_regions.contains(region) {
                    filtered.push(candidate.key_id.clone());
                    continue;
                }
            }
            if let Some(min_reliability) = rules.min_reliability {
                if candidate.usage_count > 0 {
                    let reliability = (candidate.usage_count.saturating_sub(candidate.failure_count))
                        as f64
                        / candidate.usage_count as f64;
                    if reliability < min_reliability {
                        filtered.push(candidate.key_id.clone());
                        continue;
                    }
                }
            }
            if let Some(max_cost) = rules.max_cost_per_request {
                if let Some(estimated) = candidate.estimated_cost {
                    if estimated > max_cost {
                        filtered.push(candidate.key_id.clone());
                        continue;
                    }
                }
            }
        }

        let survivors = context.candidates.len() - filtered.len();
        let allowed = survivors > 0;
        let reason = if allowed {
            format!("policy '{}' applied, {} candidate(s) filtered", policy.name, filtered.len())
        } else {
            format!("policy '{}' filtered all candidates", policy.name)
        };

        // max_cost_per_request already acted as a hard filter above; still
        // surface it as a constraint for strategies to re-check post-scoring.
        if rules.max_cost_per_request.is_none() {
            constraints.max_cost_per_request = None;
        }

        PolicyResult {
            allowed,
            reason,
            applied_policies: vec![policy.id.clone()],
            constraints,
            filtered_keys: filtered,
        }
    }

    /// Evaluate every applicable Routing/KeySelection policy for `context` in
    /// priority order, merging constraints and filters across all of them.
    /// Returns the combined result the Routing Engine acts on.
    pub fn evaluate_all(
        &self,
        scope_id: Option<&str>,
        context: &PolicyContext,
    ) -> PolicyResult {
        let mut policies = self.get_applicable_policies(PolicyScope::Global, PolicyType::Routing, scope_id);
        policies.extend(self.get_applicable_policies(
            PolicyScope::Provider,
            PolicyType::Routing,
            scope_id,
        ));
        policies.extend(self.get_applicable_policies(
            PolicyScope::Global,
            PolicyType::KeySelection,
            scope_id,
        ));
        policies.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at)));

        if policies.is_empty() {
            return PolicyResult::pass_through();
        }

        let mut applied_policies = Vec::new();
        let mut filtered_keys: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut preferred_providers = Vec::new();
        let mut preferred_regions = Vec::new();
        let mut max_cost_per_request = None;
        let mut reasons = Vec::new();

        for policy in &policies {
            let remaining_candidates: Vec<_> = context
                .candidates
                .iter()
                .filter(|c| !filtered_keys.contains(&c.key_id))
                .cloned()
                .collect();
            if remaining_candidates.is_empty() {
                break;
            }
            let sub_context = PolicyContext {
                candidates: remaining_candidates,
                provider_id: context.provider_id.clone(),
            };
            let result = self.evaluate_policy(policy, &sub_context);
            if !result.allowed {
                return PolicyResult {
                    allowed: false,
                    reason: result.reason,
                    applied_policies: result.applied_policies,
                    constraints: super::model::PolicyConstraints::default(),
                    filtered_keys: result.filtered_keys,
                };
            }
            applied_policies.extend(result.applied_policies);
            filtered_keys.extend(result.filtered_keys);
            preferred_providers.extend(result.constraints.preferred_providers);
            preferred_regions.extend(result.constraints.preferred_regions);
            if let Some(cost) = result.constraints.max_cost_per_request {
                max_cost_per_request = Some(max_cost_per_request.map_or(cost, |c: rust_decimal::Decimal| c.min(cost)));
            }
            reasons.push(format!("{} ({})", policy.name, policy.id));
        }

        let total_candidates = context.candidates.len();
        let allowed = filtered_keys.len() < total_candidates;
        PolicyResult {
            allowed,
            reason: if allowed {
                format!("applied policies: {}", reasons.join(", "))
            } else {
                format!("all candidates filtered by policies: {}", reasons.join(", "))
            },
            applied_policies,
            constraints: super::model::PolicyConstraints {
                preferred_providers,
                preferred_regions,
                max_cost_per_request,
            },
            filtered_keys: filtered_keys.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SequentialIdSource};
    use chrono::Utc;
    use std::sync::Arc;

    fn ctx() -> Context {
        Context::new(
            Arc::new(FixedClock::new(Utc::now())),
            Arc::new(SequentialIdSource::new("policy-test")),
        )
    }

    fn candidate(key_id: &str, provider_id: &str, usage: u64, failures: u64) -> super::super::model::PolicyCandidate {
        super::super::model::PolicyCandidate {
            key_id: key_id.to_string(),
            provider_id: provider_id.to_string(),
            region: None,
            usage_count: usage,
            failure_count: failures,
            estimated_cost: None,
        }
    }

    #[test]
    fn blocked_provider_filters_matching_candidates() {
        let engine = PolicyEngine::new(ctx());
        let policy = engine
            .create_policy(
                "block anthropic",
                PolicyType::Routing,
                PolicyScope::Global,
                None,
                PolicyRules {
                    blocked_providers: vec!["anthropic".to_string()],
                    ..Default::default()
                },
                10,
            )
            .unwrap();
        let context = PolicyContext {
            candidates: vec![
                candidate("key1", "openai", 10, 0),
                candidate("key3", "anthropic", 30, 0),
            ],
            provider_id: "openai".to_string(),
        };
        let result = engine.evaluate_policy(&policy, &context);
        assert!(result.allowed);
        assert_eq!(result.filtered_keys, vec!["key3".to_string()]);
    }

    #[test]
    fn min_reliability_passes_unused_keys() {
        let engine = PolicyEngine::new(ctx());
        let policy = engine
            .create_policy(
                "reliability",
                PolicyType::Routing,
                PolicyScope::Global,
                None,
                PolicyRules {
                    min_reliability: Some(0.85),
                    ..Default::default()
                },
                10,
            )
            .unwrap();
        let context = PolicyContext {
            candidates: vec![
                candidate("key1", "openai", 0, 0),
                candidate("key2", "openai", 20, 5),
            ],
            provider_id: "openai".to_string(),
        };
        let result = engine.evaluate_policy(&policy, &context);
        assert!(result.allowed);
        assert_eq!(result.filtered_keys, vec!["key2".to_string()]);
    }

    #[test]
    fn all_candidates_filtered_is_not_allowed() {
        let engine = PolicyEngine::new(ctx());
        let policy = engine
            .create_policy(
                "impossible reliability",
                PolicyType::Routing,
                PolicyScope::Global,
                None,
                PolicyRules {
                    min_reliability: Some(1.01),
                    ..Default::default()
                },
                10,
            )
            .unwrap();
        let context = PolicyContext {
            candidates: vec![candidate("key1", "openai", 10, 0)],
            provider_id: "openai".to_string(),
        };
        let result = engine.evaluate_policy(&policy, &context);
        assert!(!result.allowed);
    }

    #[test]
    fn applicable_policies_sorted_by_priority_descending() {
        let engine = PolicyEngine::new(ctx());
        engine
            .create_policy("low", PolicyType::Routing, PolicyScope::Global, None, PolicyRules::default(), 5)
            .unwrap();
        engine
            .create_policy("high", PolicyType::Routing, PolicyScope::Global, None, PolicyRules::default(), 10)
            .unwrap();
        let policies = engine.get_applicable_policies(PolicyScope::Global, PolicyType::Routing, None);
        assert_eq!(policies[0].name, "high");
        assert_eq!(policies[1].name, "low");
    }
}
