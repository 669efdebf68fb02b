//! Policy command implementation

use crate::cli::output::{format_policies_json, format_policies_table};
use crate::cli::{PolicyCreateArgs, PolicyDeleteArgs, PolicyListArgs};
use crate::policy::model::{PolicyRules, PolicyScope, PolicyType};
use crate::policy::PolicyEngine;

fn parse_policy_type(s: &str) -> Result<PolicyType, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "routing" => Ok(PolicyType::Routing),
        "key_selection" => Ok(PolicyType::KeySelection),
        "cost_control" => Ok(PolicyType::CostControl),
        _ => Err(format!(
            "Invalid policy type: {}. Use: routing, key_selection, cost_control",
            s
        )
        .into()),
    }
}

fn parse_policy_scope(s: &str) -> Result<PolicyScope, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "global" => Ok(PolicyScope::Global),
        "provider" => Ok(PolicyScope::Provider),
        "team" => Ok(PolicyScope::Team),
        _ => Err(format!("Invalid policy scope: {}. Use: global, provider, team", s).into()),
    }
}

pub fn handle_policy_create(
    args: &PolicyCreateArgs,
    policy_engine: &PolicyEngine,
) -> Result<String, Box<dyn std::error::Error>> {
    let policy_type = parse_policy_type(&args.policy_type)?;
    let scope = parse_policy_scope(&args.scope)?;

    let policy = policy_engine.create_policy(
        args.name.clone(),
        policy_type,
        scope,
        args.scope_id.clone(),
        PolicyRules::default(),
        args.priority,
    )?;

    Ok(format!("Created policy {} ({})", policy.id, policy.name))
}

pub fn handle_policy_list(
    args: &PolicyListArgs,
    policy_engine: &PolicyEngine,
) -> Result<String, Box<dyn std::error::Error>> {
    let policies = policy_engine.list_policies();

    if args.json {
        Ok(format_policies_json(&policies))
    } else {
        Ok(format_policies_table(&policies))
    }
}

pub fn handle_policy_delete(
    args: &PolicyDeleteArgs,
    policy_engine: &PolicyEngine,
) -> Result<String, Box<dyn std::error::Error>> {
    policy_engine.delete_policy(&args.id)?;
    Ok(format!("Deleted policy {}", args.id))
}
