//! Adapter startup configuration: figment-layered TOML + environment
//! variables over a typed struct with sane defaults, mirroring the
//! teacher's `Config::load()` shape (spec §9 AMBIENT "Configuration").

use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub http: HttpConfig,
    pub cache: CacheTtlConfig,
    pub fetch: FetchConfig,
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Fallback base URL used to build `self` links when no request-derived
    /// base URL is available (i.e. the adapter is hit directly, not via the
    /// Bridge). See spec §6 base-URL precedence.
    pub base_url: String,
    /// Optional bearer token the adapter requires on every request. The
    /// Bridge substitutes its own per-adapter key for this when forwarding
    /// (spec §4.9.7); set when the adapter is also reachable directly.
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            host: "0.0.0.0".to_string(),
            port: 8081,
            base_url: "http://localhost:8081".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    pub positive_ttl_secs: u64,
    pub negative_ttl_secs: u64,
    pub grace_ttl_secs: u64,
    pub max_entries: usize,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        CacheTtlConfig {
            positive_ttl_secs: 15 * 60,
            negative_ttl_secs: 60,
            grace_ttl_secs: 0,
            max_entries: 10_000,
        }
    }
}

impl CacheTtlConfig {
    pub fn to_upstream(&self) -> xreg_upstream::CacheConfig {
        xreg_upstream::CacheConfig {
            positive_ttl: Duration::from_secs(self.positive_ttl_secs),
            negative_ttl: Duration::from_secs(self.negative_ttl_secs),
            grace_ttl: Duration::from_secs(self.grace_ttl_secs),
            max_entries: self.max_entries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub per_host_concurrency: usize,
    pub max_retries: u32,
    pub base_backoff_millis: u64,
    pub max_response_bytes: u64,
    pub max_queued_per_host: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            per_host_concurrency: 32,
            max_retries: 3,
            base_backoff_millis: 100,
            max_response_bytes: 50 * 1024 * 1024,
            max_queued_per_host: 256,
        }
    }
}

impl FetchConfig {
    pub fn to_upstream(&self, request_timeout_secs: u64) -> xreg_upstream::FetcherConfig {
        xreg_upstream::FetcherConfig {
            per_host_concurrency: self.per_host_concurrency,
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.base_backoff_millis),
            max_response_bytes: self.max_response_bytes,
            max_queued_per_host: self.max_queued_per_host,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Name-index refresh cadence in hours (spec §4.5 default: 24h).
    pub refresh_interval_hours: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            refresh_interval_hours: 24,
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            http: HttpConfig::default(),
            cache: CacheTtlConfig::default(),
            fetch: FetchConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl AdapterConfig {
    /// Load from `<ADAPTER_ENV_PREFIX>_CONFIG_FILE` (or `config.toml` in the
    /// current directory when unset), then layer environment variables
    /// prefixed `<env_prefix>_` on top, e.g. `XREG_NODE_HTTP__PORT=9000`.
    pub fn load(env_prefix: &str) -> Result<Self, figment::Error> {
        let config_file_var = format!("{env_prefix}_CONFIG_FILE");
        let config_file = std::env::var(&config_file_var).unwrap_or_else(|_| "config.toml".to_string());

        let mut figment = Figment::from(figment::providers::Serialized::defaults(
            AdapterConfig::default(),
        ));
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
        let config = AdapterConfig::default();
        assert_eq!(config.http.port, 8081);
        assert_eq!(config.cache.positive_ttl_secs, 900);
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("XREG_TEST_HTTP__PORT", "9999");
        std::env::remove_var("XREG_TEST_CONFIG_FILE");
        let config = AdapterConfig::load("XREG_TEST").unwrap();
        assert_eq!(config.http.port, 9999);
        std::env::remove_var("XREG_TEST_HTTP__PORT");
    }
}
