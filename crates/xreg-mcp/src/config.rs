//! MCP-specific configuration layered on top of the shared
//! `xreg_adapter::AdapterConfig`. The provider namespace (spec.md's
//! "provider namespace" group-id column) is a deployment choice, not a
//! protocol constant, so it is configured the same way OCI's registry
//! host id is.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use xreg_adapter::AdapterConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(flatten)]
    pub adapter: AdapterConfig,
    pub registry_base_url: String,
    pub provider_namespace: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        McpConfig {
            adapter: AdapterConfig::default(),
            registry_base_url: "https://registry.modelcontextprotocol.io".to_string(),
            provider_namespace: "registry.modelcontextprotocol.io".to_string(),
        }
    }
}

impl McpConfig {
    pub fn load(env_prefix: &str) -> Result<Self, figment::Error> {
        let config_file_var = format!("{env_prefix}_CONFIG_FILE");
        let config_file = std::env::var(&config_file_var).unwrap_or_else(|_| "config.toml".to_string());

        let mut figment = Figment::from(figment::providers::Serialized::defaults(McpConfig::default()));
        if std::path::Path::new(&config_file).exists() {
            figment = figment.merge(Toml::file(&config_file));
        }
        figment
            .merge(Env::prefixed(&format!("{env_prefix}_")).split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_config_file() {
        let config = McpConfig::default();
        assert_eq!(config.provider_namespace, "registry.modelcontextprotocol.io");
    }
}
