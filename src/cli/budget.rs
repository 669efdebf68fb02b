//! Budget command implementation

use crate::cli::output::{format_budgets_json, format_budgets_table};
use crate::cli::{BudgetCreateArgs, BudgetDeleteArgs, BudgetListArgs};
use crate::cost::model::{BudgetScope, EnforcementMode};
use crate::cost::CostController;
use crate::quota::model::TimeWindow;
use rust_decimal::Decimal;
use std::str::FromStr;

fn parse_budget_scope(s: &str) -> Result<BudgetScope, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "global" => Ok(BudgetScope::Global),
        "per_provider" => Ok(BudgetScope::PerProvider),
        "per_key" => Ok(BudgetScope::PerKey),
        "per_team" => Ok(BudgetScope::PerTeam),
        _ => Err(format!(
            "Invalid budget scope: {}. Use: global, per_provider, per_key, per_team",
            s
        )
        .into()),
    }
}

fn parse_enforcement_mode(s: &str) -> Result<EnforcementMode, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "hard" => Ok(EnforcementMode::Hard),
        "soft" => Ok(EnforcementMode::Soft),
        "advisory" => Ok(EnforcementMode::Advisory),
        _ => Err(format!("Invalid enforcement mode: {}. Use: hard, soft, advisory", s).into()),
    }
}

fn parse_time_window(s: &str) -> Result<TimeWindow, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "hourly" => Ok(TimeWindow::Hourly),
        "daily" => Ok(TimeWindow::Daily),
        "monthly" => Ok(TimeWindow::Monthly),
        "custom" => Ok(TimeWindow::Custom),
        _ => Err(format!("Invalid period: {}. Use: hourly, daily, monthly, custom", s).into()),
    }
}

pub fn handle_budget_create(
    args: &BudgetCreateArgs,
    cost_controller: &CostController,
) -> Result<String, Box<dyn std::error::Error>> {
    let limit = Decimal::from_str(&args.limit)
        .map_err(|e| format!("Invalid limit '{}': {}", args.limit, e))?;
    let scope = parse_budget_scope(&args.scope)?;
    let period = parse_time_window(&args.period)?;
    let enforcement_mode = parse_enforcement_mode(&args.enforcement_mode)?;

    let budget = cost_controller.create_budget(
        scope,
        args.scope_id.clone(),
        limit,
        args.currency.clone(),
        period,
        enforcement_mode,
        0.8,
    )?;

    Ok(format!(
        "Created budget {} ({} {})",
        budget.id, budget.limit, budget.currency
    ))
}

pub fn handle_budget_list(
    args: &BudgetListArgs,
    cost_controller: &CostController,
) -> Result<String, Box<dyn std::error::Error>> {
    let budgets = cost_controller.list_budgets();

    if args.json {
        Ok(format_budgets_json(&budgets))
    } else {
        Ok(format_budgets_table(&budgets))
    }
}

pub fn handle_budget_delete(
    args: &BudgetDeleteArgs,
    cost_controller: &CostController,
) -> Result<String, Box<dyn std::error::Error>> {
    cost_controller.delete_budget(&args.id)?;
    Ok(format!("Deleted budget {}", args.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Context;
    use std::path::PathBuf;

    #[test]
    fn budget_create_succeeds() {
        let controller = CostController::new(Context::system());
        let args = BudgetCreateArgs {
            limit: "500.00".to_string(),
            scope: "global".to_string(),
            scope_id: None,
            period: "monthly".to_string(),
            enforcement_mode: "hard".to_string(),
            currency: "USD".to_string(),
            config: PathBuf::from("keyrouter.toml"),
        };

        let output = handle_budget_create(&args, &controller).unwrap();
        assert!(output.contains("500.00"));
    }

    #[test]
    fn budget_create_rejects_invalid_limit() {
        let controller = CostController::new(Context::system());
        let args = BudgetCreateArgs {
            limit: "not-a-number".to_string(),
            scope: "global".to_string(),
            scope_id: None,
            period: "monthly".to_string(),
            enforcement_mode: "hard".to_string(),
            currency: "USD".to_string(),
            config: PathBuf::from("keyrouter.toml"),
        };

        assert!(handle_budget_create(&args, &controller).is_err());
    }

    #[test]
    fn budget_list_reflects_created_budgets() {
        let controller = CostController::new(Context::system());
        controller
            .create_budget(
                BudgetScope::Global,
                None,
                Decimal::new(50000, 2),
                "USD",
                TimeWindow::Monthly,
                EnforcementMode::Hard,
                0.8,
            )
            .unwrap();

        let args = BudgetListArgs {
            json: false,
            config: PathBuf::from("keyrouter.toml"),
        };
        let output = handle_budget_list(&args, &controller).unwrap();
        assert!(output.contains("500"));
    }

    #[test]
    fn budget_delete_removes_budget() {
        let controller = CostController::new(Context::system());
        let budget = controller
            .create_budget(
                BudgetScope::Global,
                None,
                Decimal::new(50000, 2),
                "USD",
                TimeWindow::Monthly,
                EnforcementMode::Hard,
                0.8,
            )
            .unwrap();

        let args = BudgetDeleteArgs {
            id: budget.id.clone(),
            config: PathBuf::from("keyrouter.toml"),
        };
        handle_budget_delete(&args, &controller).unwrap();
        assert!(controller.list_budgets().is_empty());
    }
}
