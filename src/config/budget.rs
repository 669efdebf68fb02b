//! Budget seeds: declarative `Budget` definitions loaded at startup and
//! handed to the `CostController` via `create_budget`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cost::{BudgetScope, EnforcementMode};
use crate::quota::model::TimeWindow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetSeed {
    pub scope: BudgetScope,
    pub scope_id: Option<String>,
    pub limit: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub period: TimeWindow,
    pub enforcement_mode: EnforcementMode,
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_alert_threshold() -> f64 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_seed_parses_from_toml() {
        let toml = r#"
        scope = "global"
        limit = "100.00"
        period = "daily"
        enforcement_mode = "hard"
        "#;
        let seed: BudgetSeed = toml::from_str(toml).unwrap();
        assert_eq!(seed.currency, "USD");
        assert_eq!(seed.alert_threshold, 0.8);
    }
}
