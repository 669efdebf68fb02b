//! Output formatting helpers for CLI commands

use crate::cost::model::Budget;
use crate::key::model::{KeyState, KeyView};
use crate::policy::model::Policy;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// Format keys as a table. Material is never included — `KeyView` never
/// carries it.
pub fn format_keys_table(keys: &[KeyView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Provider", "State", "Usage", "Failures", "Last Used",
    ]);

    for k in keys {
        let state_str = match k.state {
            KeyState::Available => "available".green().to_string(),
            KeyState::Throttled => "throttled".yellow().to_string(),
            KeyState::Exhausted => "exhausted".red().to_string(),
            KeyState::Recovering => "recovering".cyan().to_string(),
            KeyState::Disabled => "disabled".red().to_string(),
            KeyState::Invalid => "invalid".red().to_string(),
        };

        table.add_row(vec![
            Cell::new(&k.id),
            Cell::new(&k.provider_id),
            Cell::new(state_str),
            Cell::new(k.usage_count),
            Cell::new(k.failure_count),
            Cell::new(
                k.last_used_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }

    table.to_string()
}

pub fn format_keys_json(keys: &[KeyView]) -> String {
    serde_json::to_string_pretty(&json!({ "keys": keys })).unwrap()
}

pub fn format_policies_table(policies: &[Policy]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Name", "Type", "Scope", "Priority", "Enabled"]);

    for p in policies {
        let enabled_str = if p.enabled {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        };

        table.add_row(vec![
            Cell::new(&p.id),
            Cell::new(&p.name),
            Cell::new(format!("{:?}", p.policy_type)),
            Cell::new(format!("{:?}", p.scope)),
            Cell::new(p.priority),
            Cell::new(enabled_str),
        ]);
    }

    table.to_string()
}

pub fn format_policies_json(policies: &[Policy]) -> String {
    serde_json::to_string_pretty(&json!({ "policies": policies })).unwrap()
}

pub fn format_budgets_table(budgets: &[Budget]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID",
        "Scope",
        "Limit",
        "Spend",
        "Period",
        "Enforcement",
    ]);

    for b in budgets {
        let spend_str = if b.current_spend >= b.limit {
            format!("{} {}", b.current_spend, b.currency).red().to_string()
        } else {
            format!("{} {}", b.current_spend, b.currency)
        };

        table.add_row(vec![
            Cell::new(&b.id),
            Cell::new(format!("{:?}", b.scope)),
            Cell::new(format!("{} {}", b.limit, b.currency)),
            Cell::new(spend_str),
            Cell::new(format!("{:?}", b.period)),
            Cell::new(format!("{:?}", b.enforcement_mode)),
        ]);
    }

    table.to_string()
}

pub fn format_budgets_json(budgets: &[Budget]) -> String {
    serde_json::to_string_pretty(&json!({ "budgets": budgets })).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::model::Metadata;
    use crate::policy::model::{PolicyRules, PolicyScope, PolicyType};
    use crate::quota::model::TimeWindow;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn test_key_view() -> KeyView {
        KeyView {
            id: "key-1".to_string(),
            provider_id: "openai".to_string(),
            state: KeyState::Available,
            last_state_change: Utc::now(),
            created_at: Utc::now(),
            last_used_at: None,
            usage_count: 3,
            failure_count: 0,
            cooldown_until: None,
            metadata: Metadata::default(),
        }
    }

    fn test_policy() -> Policy {
        Policy {
            id: "policy-1".to_string(),
            name: "prefer-openai".to_string(),
            policy_type: PolicyType::Routing,
            scope: PolicyScope::Global,
            scope_id: None,
            rules: PolicyRules::default(),
            priority: 0,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    fn test_budget() -> Budget {
        Budget {
            id: "budget-1".to_string(),
            scope: crate::cost::model::BudgetScope::Global,
            scope_id: None,
            limit: Decimal::new(50000, 2),
            currency: "USD".to_string(),
            period: TimeWindow::Monthly,
            current_spend: Decimal::ZERO,
            period_start: Utc::now(),
            enforcement_mode: crate::cost::model::EnforcementMode::Hard,
            alert_threshold: 0.8,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn format_keys_table_empty() {
        let output = format_keys_table(&[]);
        assert!(output.contains("Provider"));
    }

    #[test]
    fn format_keys_table_with_data() {
        let output = format_keys_table(&[test_key_view()]);
        assert!(output.contains("key-1"));
        assert!(output.contains("openai"));
    }

    #[test]
    fn format_keys_json_valid() {
        let output = format_keys_json(&[test_key_view()]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed.get("keys").is_some());
    }

    #[test]
    fn format_policies_table_with_data() {
        let output = format_policies_table(&[test_policy()]);
        assert!(output.contains("prefer-openai"));
    }

    #[test]
    fn format_budgets_table_with_data() {
        let output = format_budgets_table(&[test_budget()]);
        assert!(output.contains("budget-1"));
        assert!(output.contains("500"));
    }

    #[test]
    fn format_budgets_json_valid() {
        let output = format_budgets_json(&[test_budget()]);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert!(parsed.get("budgets").is_some());
    }
}
