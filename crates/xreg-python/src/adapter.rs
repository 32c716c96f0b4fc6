//! `PythonAdapter`: the PyPI ecosystem's `EcosystemAdapter` implementation,
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

use crate::mapping::{self, PypiDoc};

const DEFAULT_UPSTREAM_BASE: &str = "https://pypi.org/pypi";
const DEFAULT_SIMPLE_INDEX_URL: &str = "https://pypi.org/simple/";

pub struct PythonAdapter {
    fetcher: Arc<Fetcher>,
    cache: MetadataCache<Arc<PypiDoc>>,
    index: Arc<NameIndex>,
    upstream_base: String,
    max_limit: u64,
}

impl PythonAdapter {
    async fn fetch_doc(&self, normalized_name: &str) -> Result<Arc<PypiDoc>, AdapterError> {
        let key = CacheKey::resource("python", normalized_name);
        let fetcher = self.fetcher.clone();
        let url = format!("{}/{}/json", self.upstream_base, normalized_name);
        self.cache
            .get_or_fetch(key, || async move {
                let doc: PypiDoc = fetcher.get_json(&url, None).await?;
                Ok(Arc::new(doc))
            })
            .await
            .map_err(AdapterError::from_upstream)
    }
}

#[async_trait]
impl xreg_adapter::EcosystemAdapter for PythonAdapter {
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
        "Python Package Index"
    }

    fn name_index(&self) -> Arc<NameIndex> {
        self.index.clone()
    }

    fn max_limit(&self) -> u64 {
        self.max_limit
    }

    async fn fetch_resource(&self, resource_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        mapping::resource_from_doc(&doc, base_url)
    }

    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        mapping::version_from_doc(&doc, version_id, base_url)
    }

    async fn list_versions(&self, resource_id: &str, base_url: &str) -> Result<Vec<Version>, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        mapping::list_version_ids_newest_first(&doc)
            .into_iter()
            .map(|vid| mapping::version_from_doc(&doc, &vid, base_url))
            .collect()
    }

    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError> {
        let doc = self.fetch_doc(resource_id).await?;
        Ok(mapping::default_version_id(&doc))
    }

    fn model_extras(&self) -> Value {
        json!({ "attributes": ["license", "homepage", "authors", "downloadurl", "sha256", "dependencies"] })
    }
}

#[derive(Debug, Deserialize)]
struct SimpleIndexProject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SimpleIndexResponse {
    projects: Vec<SimpleIndexProject>,
}

/// Streams PyPI's full project-name catalog from the JSON variant of the
/// "simple" index (spec §4.5's "PyPI simple index" bulk catalog source);
/// names returned here are raw (un-normalized) project names, normalized
/// by `mapping::normalize` when used as resource ids.
async fn fetch_catalog_names(fetcher: &Fetcher, index_url: &str) -> Result<Vec<String>, UpstreamError> {
    let resp: SimpleIndexResponse = fetcher.get_json(index_url, None).await?;
    Ok(resp
        .projects
        .into_iter()
        .map(|p| mapping::normalize(&p.name))
        .collect())
}

/// Builds a ready-to-serve `PythonAdapter`: fetches the startup name index
/// (falling back to an empty index on failure so the adapter can still
/// come up and serve `/model`/`/capabilities`, per spec §4.4's readiness
/// window) and spawns the background refresh task of spec §4.8.
pub async fn build(config: &AdapterConfig) -> Arc<PythonAdapter> {
    let fetcher = Arc::new(Fetcher::new(
        config.fetch.to_upstream(config.http.request_timeout_secs),
    ));
    let names = match fetch_catalog_names(&fetcher, DEFAULT_SIMPLE_INDEX_URL).await {
        Ok(names) => {
            info!(count = names.len(), "loaded PyPI name index");
            names
        }
        Err(err) => {
            warn!(error = %err, "failed to load PyPI name index at startup; starting empty");
            Vec::new()
        }
    };
    let index = Arc::new(NameIndex::new(names));
    let cache = MetadataCache::new(config.cache.to_upstream());

    let adapter = Arc::new(PythonAdapter {
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
            match fetch_catalog_names(&fetcher, DEFAULT_SIMPLE_INDEX_URL).await {
                Ok(names) => {
                    info!(count = names.len(), "refreshed PyPI name index");
                    index.swap(names);
                }
                Err(err) => {
                    warn!(error = %err, "PyPI name index refresh failed; keeping previous index live");
                }
            }
        }
    });
}
