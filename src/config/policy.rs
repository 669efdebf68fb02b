//! Policy seeds: declarative `Policy` definitions loaded at startup and
//! handed to the `PolicyEngine` via `create_policy`.

use serde::{Deserialize, Serialize};

use crate::policy::model::{PolicyRules, PolicyScope, PolicyType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySeed {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    pub scope: PolicyScope,
    pub scope_id: Option<String>,
    #[serde(default)]
    pub rules: PolicyRules,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_seed_parses_from_toml() {
        let toml = r#"
        name = "block-eu-region"
        type = "routing"
        scope = "global"
        priority = 10

        [rules]
        blocked_regions = ["eu-west-1"]
        "#;
        let seed: PolicySeed = toml::from_str(toml).unwrap();
        assert!(seed.enabled);
        assert_eq!(seed.rules.blocked_regions, vec!["eu-west-1".to_string()]);
    }
}
