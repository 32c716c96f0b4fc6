//! OCI-specific configuration layered on top of the shared
//! `xreg_adapter::AdapterConfig` (spec §9 Open Question: "may the OCI
//! adapter's catalog endpoint be disabled entirely").

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use xreg_adapter::AdapterConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OciConfig {
    #[serde(flatten)]
    pub adapter: AdapterConfig,
    pub registry_base_url: String,
    pub registry_host_id: String,
    /// When false, `GET /containerregistries/<host>/images` returns
    /// `not-found` instead of consulting the name index — some registries
    /// (notably Docker Hub) refuse unauthenticated `_catalog` scans
    /// (spec §9 Open Question).
    pub catalog_enabled: bool,
}

impl Default for OciConfig {
    fn default() -> Self {
        OciConfig {
            adapter: AdapterConfig::default(),
            registry_base_url: "https://registry-1.docker.io".to_string(),
            registry_host_id: "registry-1.docker.io".to_string(),
            catalog_enabled: true,
        }
    }
}

impl OciConfig {
    pub fn load(env_prefix: &str) -> Result<Self, figment::Error> {
        let config_file_var = format!("{env_prefix}_CONFIG_FILE");
        let config_file = std::env::var(&config_file_var).unwrap_or_else(|_| "config.toml".to_string());

        let mut figment = Figment::from(figment::providers::Serialized::defaults(OciConfig::default()));
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
        let config = OciConfig::default();
        assert!(config.catalog_enabled);
        assert_eq!(config.registry_host_id, "registry-1.docker.io");
    }
}
