//! `McpAdapter`: the MCP server-registry ecosystem's `EcosystemAdapter`
//! implementation, wiring `mapping.rs`'s translation functions to the
//! shared fetcher, cache and name index (spec §4.5).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use xreg_adapter::AdapterError;
use xreg_core::{Resource, Version};
use xreg_upstream::{CacheKey, Fetcher, MetadataCache, NameIndex, UpstreamError};

use crate::config::McpConfig;
use crate::mapping::{self, McpDoc, McpServerEntry};

const PAGE_LIMIT: u32 = 100;

pub struct McpAdapter {
    fetcher: Arc<Fetcher>,
    cache: MetadataCache<Arc<McpDoc>>,
    index: Arc<NameIndex>,
    registry_base_url: String,
    provider_namespace: &'static str,
    max_limit: u64,
}

#[derive(Debug, Deserialize)]
struct ServerListMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerListResponse {
    #[serde(default)]
    servers: Vec<McpServerEntry>,
    #[serde(default)]
    metadata: Option<ServerListMetadata>,
}

/// Pages through the provider's full server listing, invoking `on_page`
/// for each batch. Used both for the startup/refresh name index and for
/// a resource's per-name entry aggregation (spec §4.5's "provider's MCP
/// server listing").
async fn paginate(
    fetcher: &Fetcher,
    registry_base_url: &str,
    search: Option<&str>,
    mut on_page: impl FnMut(Vec<McpServerEntry>),
) -> Result<(), UpstreamError> {
    let mut cursor: Option<String> = None;
    loop {
        let mut url = format!("{registry_base_url}/v0/servers?limit={PAGE_LIMIT}");
        if let Some(search) = search {
            url.push_str(&format!("&search={}", urlencoding::encode(search)));
        }
        if let Some(cursor) = &cursor {
            url.push_str(&format!("&cursor={}", urlencoding::encode(cursor)));
        }
        let page: ServerListResponse = fetcher.get_json(&url, None).await?;
        let done = page.servers.is_empty();
        on_page(page.servers);
        cursor = page.metadata.and_then(|m| m.next_cursor);
        if done || cursor.is_none() {
            break;
        }
    }
    Ok(())
}

impl McpAdapter {
    async fn fetch_doc(&self, resource_id: &str) -> Result<Arc<McpDoc>, AdapterError> {
        let key = CacheKey::resource("mcp", resource_id);
        let fetcher = self.fetcher.clone();
        let registry_base_url = self.registry_base_url.clone();
        let resource_id = resource_id.to_string();
        self.cache
            .get_or_fetch(key, || async move {
                let mut matched: BTreeMap<String, Vec<McpServerEntry>> = BTreeMap::new();
                paginate(&fetcher, &registry_base_url, Some(&resource_id), |entries| {
                    for entry in entries {
                        if mapping::sanitize_name(&entry.name) == resource_id {
                            matched.entry(entry.name.clone()).or_default().push(entry);
                        }
                    }
                })
                .await?;

                let (raw_name, entries) = matched.into_iter().next().ok_or(UpstreamError::Http {
                    status: 404,
                    body: String::new(),
                })?;
                Ok(Arc::new(McpDoc { raw_name, entries }))
            })
            .await
            .map_err(AdapterError::from_upstream)
    }
}

#[async_trait]
impl xreg_adapter::EcosystemAdapter for McpAdapter {
    fn group_type(&self) -> &'static str {
        mapping::GROUP_TYPE
    }
    fn group_id(&self) -> &'static str {
        self.provider_namespace
    }
    fn resource_type(&self) -> &'static str {
        mapping::RESOURCE_TYPE
    }
    fn group_name(&self) -> &'static str {
        "MCP server registry"
    }

    fn name_index(&self) -> Arc<NameIndex> {
        self.index.clone()
    }

    fn max_limit(&self) -> u64 {
        self.max_limit
    }

    async fn fetch_resource(&self, resource_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        mapping::resource_from_doc(&doc, self.provider_namespace, base_url)
    }

    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        mapping::version_from_doc(&doc, self.provider_namespace, version_id, base_url)
    }

    async fn list_versions(&self, resource_id: &str, base_url: &str) -> Result<Vec<Version>, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        mapping::list_version_ids_newest_first(&doc)
            .into_iter()
            .map(|vid| mapping::version_from_doc(&doc, self.provider_namespace, &vid, base_url))
            .collect()
    }

    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        Ok(mapping::default_version_id(&doc))
    }

    fn model_extras(&self) -> Value {
        json!({ "attributes": ["repositoryurl", "repositorysource"] })
    }
}

/// Streams the provider's full server catalog, deduplicating by
/// sanitized name, for the startup/refresh name index (spec §4.5's "MCP
/// provider list" bulk catalog source).
async fn fetch_catalog_names(fetcher: &Fetcher, registry_base_url: &str) -> Result<Vec<String>, UpstreamError> {
    let mut names = std::collections::BTreeSet::new();
    paginate(fetcher, registry_base_url, None, |entries| {
        for entry in entries {
            names.insert(mapping::sanitize_name(&entry.name));
        }
    })
    .await?;
    Ok(names.into_iter().collect())
}

pub async fn build(config: &McpConfig) -> Arc<McpAdapter> {
    let fetcher = Arc::new(Fetcher::new(
        config.adapter.fetch.to_upstream(config.adapter.http.request_timeout_secs),
    ));
    let names = match fetch_catalog_names(&fetcher, &config.registry_base_url).await {
        Ok(names) => {
            info!(count = names.len(), "loaded MCP server catalog");
            names
        }
        Err(err) => {
            warn!(error = %err, "failed to load MCP server catalog at startup; starting empty");
            Vec::new()
        }
    };
    let index = Arc::new(NameIndex::new(names));
    let cache = MetadataCache::new(config.adapter.cache.to_upstream());

    let provider_namespace: &'static str = Box::leak(config.provider_namespace.clone().into_boxed_str());

    let adapter = Arc::new(McpAdapter {
        fetcher: fetcher.clone(),
        cache,
        index: index.clone(),
        registry_base_url: config.registry_base_url.clone(),
        provider_namespace,
        max_limit: 100,
    });

    spawn_refresh(fetcher, index, config.registry_base_url.clone(), config.adapter.index.refresh_interval_hours);
    adapter
}

fn spawn_refresh(fetcher: Arc<Fetcher>, index: Arc<NameIndex>, registry_base_url: String, refresh_interval_hours: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(refresh_interval_hours.max(1) * 3600);
        loop {
            tokio::time::sleep(interval).await;
            match fetch_catalog_names(&fetcher, &registry_base_url).await {
                Ok(names) => {
                    info!(count = names.len(), "refreshed MCP server catalog");
                    index.swap(names);
                }
                Err(err) => {
                    warn!(error = %err, "MCP server catalog refresh failed; keeping previous index live");
                }
            }
        }
    });
}
