//! Configuration module for keyrouterd
//!
//! Provides layered configuration loading from files, environment variables, and defaults.

pub mod budget;
pub mod error;
pub mod logging;
pub mod manager;
pub mod policy;
pub mod provider;
pub mod server;

pub use budget::BudgetSeed;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use manager::{ConfigHistory, ConfigManager};
pub use policy::PolicySeed;
pub use provider::{ProviderConfig, ProviderKind};
pub use server::ServerConfig;

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::routing::RoutingObjective;

/// Name of the environment variable holding the base64-encoded master key
/// used to construct the `EncryptionService`, unless overridden.
const DEFAULT_MASTER_KEY_ENV: &str = "KEYROUTER_MASTER_KEY";

fn default_master_key_env() -> String {
    DEFAULT_MASTER_KEY_ENV.to_string()
}

/// Top-level configuration: the full set of inputs needed to assemble a
/// running router (spec §1/§9) short of the runtime state the system builds
/// up itself (keys, budgets' current spend, quota counters).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub providers: Vec<ProviderConfig>,
    pub budgets: Vec<BudgetSeed>,
    pub policies: Vec<PolicySeed>,
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
    pub default_objective: Option<String>,
    /// Name of the environment variable holding the bearer token mutation
    /// endpoints require. Unset disables management auth entirely, which is
    /// only appropriate for local development.
    pub management_token_env: Option<String>,
}

impl RouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supports KEYROUTER_* environment variables for common settings.
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("KEYROUTER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(host) = std::env::var("KEYROUTER_HOST") {
            self.server.host = host;
        }
        if let Ok(level) = std::env::var("KEYROUTER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("KEYROUTER_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(master_key_env) = std::env::var("KEYROUTER_MASTER_KEY_ENV") {
            self.master_key_env = master_key_env;
        }

        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if provider.id.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("providers[{}].id", i),
                    message: "id cannot be empty".to_string(),
                });
            }
            if provider.base_url.is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("providers[{}].base_url", i),
                    message: "base_url cannot be empty".to_string(),
                });
            }
        }

        for (i, budget) in self.budgets.iter().enumerate() {
            if budget.limit.is_sign_negative() || budget.limit.is_zero() {
                return Err(ConfigError::Validation {
                    field: format!("budgets[{}].limit", i),
                    message: "limit must be positive".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Read and base64-decode the master key named by `master_key_env`.
    pub fn resolve_master_key(&self) -> Result<Vec<u8>, ConfigError> {
        let encoded = std::env::var(&self.master_key_env).map_err(|_| ConfigError::MissingField(self.master_key_env.clone()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::Validation {
                field: self.master_key_env.clone(),
                message: format!("not valid base64: {e}"),
            })
    }

    /// Parse `default_objective` (e.g. "cost", "fairness") into a
    /// `RoutingObjective`, falling back to fairness when unset or unknown.
    pub fn default_routing_objective(&self) -> RoutingObjective {
        self.default_objective
            .as_deref()
            .map(RoutingObjective::from)
            .unwrap_or_else(RoutingObjective::default_fairness)
    }

    /// Read the bearer token named by `management_token_env`, if configured.
    pub fn resolve_management_token(&self) -> Option<String> {
        let var = self.management_token_env.as_ref()?;
        std::env::var(var).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn router_config_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.server.port, 8000);
        assert!(config.providers.is_empty());
        assert_eq!(config.master_key_env, DEFAULT_MASTER_KEY_ENV);
    }

    #[test]
    fn router_config_parse_minimal_toml() {
        let toml = r#"
        [server]
        port = 9000
        "#;

        let config: RouterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn router_config_parse_providers_and_budgets() {
        let toml = r#"
        [[providers]]
        id = "openai"
        kind = "open_ai"
        base_url = "https://api.openai.com"

        [[budgets]]
        scope = "global"
        limit = "500.00"
        period = "monthly"
        enforcement_mode = "soft"
        "#;

        let config: RouterConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.budgets.len(), 1);
    }

    #[test]
    fn router_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[server]\nport = 8080").unwrap();

        let config = RouterConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn router_config_missing_file_error() {
        let result = RouterConfig::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn router_config_env_override_port() {
        std::env::set_var("KEYROUTER_PORT", "9999");
        let config = RouterConfig::default().with_env_overrides();
        std::env::remove_var("KEYROUTER_PORT");

        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn router_config_validate_rejects_empty_provider_id() {
        let mut config = RouterConfig::default();
        config.providers.push(ProviderConfig {
            id: String::new(),
            kind: ProviderKind::OpenAi,
            base_url: "https://api.openai.com".to_string(),
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn router_config_resolve_master_key_missing_env_errors() {
        let config = RouterConfig {
            master_key_env: "KEYROUTER_TEST_MISSING_KEY_VAR".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.resolve_master_key(), Err(ConfigError::MissingField(_))));
    }

    #[test]
    fn router_config_resolve_management_token_unset_returns_none() {
        let config = RouterConfig::default();
        assert!(config.resolve_management_token().is_none());
    }

    #[test]
    fn router_config_resolve_management_token_reads_named_env_var() {
        std::env::set_var("KEYROUTER_TEST_MGMT_TOKEN", "secret-token");
        let config = RouterConfig {
            management_token_env: Some("KEYROUTER_TEST_MGMT_TOKEN".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_management_token().as_deref(), Some("secret-token"));
        std::env::remove_var("KEYROUTER_TEST_MGMT_TOKEN");
    }
}
