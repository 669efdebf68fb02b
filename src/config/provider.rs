//! Provider adapter configuration: which adapters to construct at startup
//! and where their APIs live.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_parses_from_toml() {
        let toml = r#"
        id = "openai"
        kind = "open_ai"
        base_url = "https://api.openai.com"
        "#;
        let config: ProviderConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.kind, ProviderKind::OpenAi);
    }
}
