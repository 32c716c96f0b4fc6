//! The read-only routing table built once at startup from the merged model
//! (spec §4.9.4, §5 "Routing table: built once at startup, then read-only;
//! no locking").

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::AdapterDescriptor;

/// Everything the forwarder and health prober need about one routed
/// adapter: enough to rebuild a request, never the client's own bearer
/// token.
#[derive(Debug, Clone)]
pub struct AdapterRoute {
    pub url: String,
    pub api_key: Option<String>,
    pub health_path: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    by_group_type: BTreeMap<String, AdapterRoute>,
}

impl RoutingTable {
    /// Build from the merge step's `group-type -> adapter url` map plus the
    /// original descriptors (for api key / health path / timeout lookup).
    pub fn build(group_type_urls: &BTreeMap<String, String>, descriptors: &[AdapterDescriptor]) -> Self {
        let mut by_group_type = BTreeMap::new();
        for (group_type, url) in group_type_urls {
            if let Some(descriptor) = descriptors.iter().find(|d| &d.url == url) {
                by_group_type.insert(
                    group_type.clone(),
                    AdapterRoute {
                        url: descriptor.url.clone(),
                        api_key: descriptor.api_key.clone(),
                        health_path: descriptor.health_path.clone(),
                        timeout: descriptor.timeout(),
                    },
                );
            }
        }
        RoutingTable { by_group_type }
    }

    pub fn resolve(&self, group_type: &str) -> Option<&AdapterRoute> {
        self.by_group_type.get(group_type)
    }

    pub fn routes(&self) -> impl Iterator<Item = (&String, &AdapterRoute)> {
        self.by_group_type.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.by_group_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(url: &str) -> AdapterDescriptor {
        AdapterDescriptor {
            url: url.to_string(),
            api_key: Some("secret".to_string()),
            timeout_ms: 5_000,
            health_path: "/health".to_string(),
        }
    }

    #[test]
    fn resolves_group_type_to_its_adapter() {
        let descriptors = vec![descriptor("http://node:8081")];
        let mut urls = BTreeMap::new();
        urls.insert("noderegistries".to_string(), "http://node:8081".to_string());
        let table = RoutingTable::build(&urls, &descriptors);
        let route = table.resolve("noderegistries").unwrap();
        assert_eq!(route.url, "http://node:8081");
        assert_eq!(route.api_key.as_deref(), Some("secret"));
        assert!(table.resolve("pythonregistries").is_none());
    }
}
