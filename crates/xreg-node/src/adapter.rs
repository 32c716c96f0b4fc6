//! `NodeAdapter`: the npm ecosystem's `EcosystemAdapter` implementation,
//! wiring `mapping.rs`'s translation functions to the shared fetcher, cache
//! and name index (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use xreg_adapter::{AdapterConfig, AdapterError};
use xreg_core::{Resource, Version};
use xreg_upstream::{CacheKey, Fetcher, MetadataCache, NameIndex, UpstreamError};

use crate::mapping::{self, NpmPackageDoc};

const DEFAULT_UPSTREAM_BASE: &str = "https://registry.npmjs.org";
const DEFAULT_CATALOG_URL: &str = "https://replicate.npmjs.com/_all_docs";

pub struct NodeAdapter {
    fetcher: Arc<Fetcher>,
    cache: MetadataCache<Arc<NpmPackageDoc>>,
    index: Arc<NameIndex>,
    upstream_base: String,
    max_limit: u64,
}

impl NodeAdapter {
    async fn fetch_doc(&self, raw_name: &str) -> Result<Arc<NpmPackageDoc>, AdapterError> {
        let key = CacheKey::resource("node", raw_name);
        let fetcher = self.fetcher.clone();
        let url = format!("{}/{}", self.upstream_base, urlencoding::encode(raw_name));
        self.cache
            .get_or_fetch(key, || async move {
                let doc: NpmPackageDoc = fetcher.get_json(&url, None).await?;
                Ok(Arc::new(doc))
            })
            .await
            .map_err(AdapterError::from_upstream)
    }
}

#[async_trait]
impl xreg_adapter::EcosystemAdapter for NodeAdapter {
    fn group_type(&self) -> &'static str {
        mapping::GROUP_TYPE
    }
    fn group_id(&self) -> &'static str {
        mapping::GROUP_ID
    }
    fn resource_type(&self) -> &'static str {
        mapping::RESOURCE_TYPE
    }
    fn group_name(&self) -> &'static str {
        "npm public registry"
    }

    fn name_index(&self) -> Arc<NameIndex> {
        self.index.clone()
    }

    fn max_limit(&self) -> u64 {
        self.max_limit
    }

    async fn fetch_resource(&self, resource_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
        let raw_name = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&raw_name).await?;
        mapping::resource_from_doc(&doc, base_url)
    }

    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError> {
        let raw_name = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&raw_name).await?;
        mapping::version_from_doc(&doc, version_id, base_url)
    }

    async fn list_versions(&self, resource_id: &str, base_url: &str) -> Result<Vec<Version>, AdapterError> {
        let raw_name = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&raw_name).await?;
        mapping::list_version_ids_newest_first(&doc)
            .into_iter()
            .map(|vid| mapping::version_from_doc(&doc, &vid, base_url))
            .collect()
    }

    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError> {
        let raw_name = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&raw_name).await?;
        Ok(mapping::default_version_id(&doc).map(String::from))
    }

    fn model_extras(&self) -> Value {
        json!({ "attributes": ["license", "homepage", "downloadurl", "integrity", "dependencies"] })
    }
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

/// Streams npm's full package-name catalog from the CouchDB-backed
/// replication endpoint (spec §4.5's "npm `_all`" bulk catalog source).
async fn fetch_catalog_names(fetcher: &Fetcher, catalog_url: &str) -> Result<Vec<String>, UpstreamError> {
    let resp: AllDocsResponse = fetcher.get_json(catalog_url, None).await?;
    Ok(resp
        .rows
        .into_iter()
        .map(|row| row.id)
        .filter(|id| !id.starts_with('_'))
        .collect())
}

/// Builds a ready-to-serve `NodeAdapter`: fetches the startup name index
/// (falling back to an empty index on failure so the adapter can still
/// come up and serve `/model`/`/capabilities`, per spec §4.4's readiness
/// window) and spawns the background refresh task of spec §4.8.
pub async fn build(config: &AdapterConfig) -> Arc<NodeAdapter> {
    let fetcher = Arc::new(Fetcher::new(
        config.fetch.to_upstream(config.http.request_timeout_secs),
    ));
    let names = match fetch_catalog_names(&fetcher, DEFAULT_CATALOG_URL).await {
        Ok(names) => {
            info!(count = names.len(), "loaded npm name index");
            names
        }
        Err(err) => {
            warn!(error = %err, "failed to load npm name index at startup; starting empty");
            Vec::new()
        }
    };
    let index = Arc::new(NameIndex::new(names));
    let cache = MetadataCache::new(config.cache.to_upstream());

    let adapter = Arc::new(NodeAdapter {
        fetcher: fetcher.clone(),
        cache,
        index: index.clone(),
        upstream_base: DEFAULT_UPSTREAM_BASE.to_string(),
        max_limit: 100,
    });

    spawn_refresh(fetcher, index, config.index.refresh_interval_hours);
    adapter
}

fn spawn_refresh(fetcher: Arc<Fetcher>, index: Arc<NameIndex>, refresh_interval_hours: u64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(refresh_interval_hours.max(1) * 3600);
        loop {
            tokio::time::sleep(interval).await;
            match fetch_catalog_names(&fetcher, DEFAULT_CATALOG_URL).await {
                Ok(names) => {
                    info!(count = names.len(), "refreshed npm name index");
                    index.swap(names);
                }
                Err(err) => {
                    warn!(error = %err, "npm name index refresh failed; keeping previous index live");
                }
            }
        }
    });
}
