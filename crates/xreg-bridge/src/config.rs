//! Bridge startup configuration (spec §4.9.1, §6): a list of adapter
//! descriptors plus the Bridge's own HTTP surface, loaded the same way
//! `xreg_adapter::AdapterConfig` is — figment-layered TOML + environment.

use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// One upstream adapter the Bridge discovers at startup (spec §6 "Startup
/// configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_health_path() -> String {
    "/".to_string()
}

impl AdapterDescriptor {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeHttpConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Health-probe timeout default (spec §5: default 3s per adapter).
    pub health_probe_timeout_ms: u64,
}

impl Default for BridgeHttpConfig {
    fn default() -> Self {
        BridgeHttpConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            health_probe_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub http: BridgeHttpConfig,
    #[serde(default)]
    pub adapters: Vec<AdapterDescriptor>,
}

impl BridgeConfig {
    /// Load from `<env_prefix>_CONFIG_FILE` (or `bridge.toml` in the current
    /// directory when unset), layering `<env_prefix>_`-prefixed environment
    /// variables for scalar HTTP overrides on top. The adapter list is only
    /// ever read from the TOML file: there is no sane env-var encoding for a
    /// list of descriptors, so environments that need dynamic adapter sets
    /// should template the TOML file instead.
    pub fn load(env_prefix: &str) -> Result<Self, figment::Error> {
        let config_file_var = format!("{env_prefix}_CONFIG_FILE");
        let config_file = std::env::var(&config_file_var).unwrap_or_else(|_| "bridge.toml".to_string());

        let mut figment = Figment::from(figment::providers::Serialized::defaults(BridgeConfig::default()));
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
        let config = BridgeConfig::default();
        assert_eq!(config.http.port, 8080);
        assert!(config.adapters.is_empty());
    }

    #[test]
    fn descriptor_defaults_health_path_and_timeout() {
        let toml = r#"
            [[adapters]]
            url = "http://node:8081"
        "#;
        let config: BridgeConfig = Figment::from(figment::providers::Serialized::defaults(BridgeConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .unwrap();
        assert_eq!(config.adapters.len(), 1);
        assert_eq!(config.adapters[0].health_path, "/");
        assert_eq!(config.adapters[0].timeout_ms, 10_000);
    }
}
