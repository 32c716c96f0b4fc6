//! `OciAdapter`: the OCI container-registry ecosystem's
//! `EcosystemAdapter` implementation, wiring `mapping.rs`'s translation
//! functions to the shared fetcher, cache and name index (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use xreg_adapter::AdapterError;
use xreg_core::{Resource, Version};
use xreg_upstream::{CacheKey, Fetcher, MetadataCache, NameIndex, UpstreamError};

use crate::config::OciConfig;
use crate::mapping::{self, OciDoc};

pub struct OciAdapter {
    fetcher: Arc<Fetcher>,
    cache: MetadataCache<Arc<OciDoc>>,
    index: Arc<NameIndex>,
    registry_base_url: String,
    group_id: &'static str,
    catalog_enabled: bool,
    max_limit: u64,
}

impl OciAdapter {
    async fn fetch_doc(&self, repository: &str) -> Result<Arc<OciDoc>, AdapterError> {
        let key = CacheKey::resource("oci", repository);
        let fetcher = self.fetcher.clone();
        let url = format!("{}/v2/{}/tags/list", self.registry_base_url, repository);
        let repository = repository.to_string();
        self.cache
            .get_or_fetch(key, || async move {
                let resp: TagsListResponse = fetcher.get_json(&url, None).await?;
                if resp.tags.is_empty() {
                    return Err(UpstreamError::Http {
                        status: 404,
                        body: String::new(),
                    });
                }
                Ok(Arc::new(OciDoc {
                    repository,
                    tags: resp.tags,
                }))
            })
            .await
            .map_err(AdapterError::from_upstream)
    }
}

#[async_trait]
impl xreg_adapter::EcosystemAdapter for OciAdapter {
    fn group_type(&self) -> &'static str {
        mapping::GROUP_TYPE
    }
    fn group_id(&self) -> &'static str {
        self.group_id
    }
    fn resource_type(&self) -> &'static str {
        mapping::RESOURCE_TYPE
    }
    fn group_name(&self) -> &'static str {
        "OCI container registry"
    }

    fn name_index(&self) -> Arc<NameIndex> {
        self.index.clone()
    }

    fn max_limit(&self) -> u64 {
        self.max_limit
    }

    fn catalog_disabled(&self) -> bool {
        !self.catalog_enabled
    }

    async fn fetch_resource(&self, resource_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
        let repository = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&repository).await?;
        mapping::resource_from_doc(&doc, self.group_id, base_url)
    }

    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError> {
        let repository = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&repository).await?;
        mapping::version_from_doc(&doc, self.group_id, version_id, base_url)
    }

    async fn list_versions(&self, resource_id: &str, base_url: &str) -> Result<Vec<Version>, AdapterError> {
        let repository = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&repository).await?;
        mapping::list_version_ids_newest_first(&doc)
            .into_iter()
            .map(|vid| mapping::version_from_doc(&doc, self.group_id, &vid, base_url))
            .collect()
    }

    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError> {
        let repository = mapping::decode_resource_id(resource_id);
        let doc = self.fetch_doc(&repository).await?;
        Ok(mapping::default_version_id(&doc))
    }

    fn model_extras(&self) -> Value {
        json!({ "attributes": ["reference"] })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    repositories: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TagsListResponse {
    #[serde(default)]
    tags: Vec<String>,
}

/// Streams the registry's repository catalog via the OCI Distribution v2
/// `_catalog` endpoint (spec §4.5 OCI notes). Returns an empty list
/// without error when the catalog is administratively disabled, matching
/// spec §9's Open Question resolution.
async fn fetch_catalog_names(fetcher: &Fetcher, registry_base_url: &str, catalog_enabled: bool) -> Result<Vec<String>, UpstreamError> {
    if !catalog_enabled {
        return Ok(Vec::new());
    }
    let url = format!("{registry_base_url}/v2/_catalog?n=10000");
    let resp: CatalogResponse = fetcher.get_json(&url, None).await?;
    Ok(resp
        .repositories
        .into_iter()
        .map(|r| mapping::encode_resource_id(&r))
        .collect())
}

pub async fn build(config: &OciConfig) -> Arc<OciAdapter> {
    let fetcher = Arc::new(Fetcher::new(
        config.adapter.fetch.to_upstream(config.adapter.http.request_timeout_secs),
    ));
    let names = match fetch_catalog_names(&fetcher, &config.registry_base_url, config.catalog_enabled).await {
        Ok(names) => {
            info!(count = names.len(), "loaded OCI repository catalog");
            names
        }
        Err(err) => {
            warn!(error = %err, "failed to load OCI repository catalog at startup; starting empty");
            Vec::new()
        }
    };
    let index = Arc::new(NameIndex::new(names));
    let cache = MetadataCache::new(config.adapter.cache.to_upstream());

    let group_id: &'static str = Box::leak(config.registry_host_id.clone().into_boxed_str());

    let adapter = Arc::new(OciAdapter {
        fetcher: fetcher.clone(),
        cache,
        index: index.clone(),
        registry_base_url: config.registry_base_url.clone(),
        group_id,
        catalog_enabled: config.catalog_enabled,
        max_limit: 100,
    });

    spawn_refresh(
        fetcher,
        index,
        config.registry_base_url.clone(),
        config.catalog_enabled,
        config.adapter.index.refresh_interval_hours,
    );
    adapter
}

fn spawn_refresh(
    fetcher: Arc<Fetcher>,
    index: Arc<NameIndex>,
    registry_base_url: String,
    catalog_enabled: bool,
    refresh_interval_hours: u64,
) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(refresh_interval_hours.max(1) * 3600);
        loop {
            tokio::time::sleep(interval).await;
            match fetch_catalog_names(&fetcher, &registry_base_url, catalog_enabled).await {
                Ok(names) => {
                    info!(count = names.len(), "refreshed OCI repository catalog");
                    index.swap(names);
                }
                Err(err) => {
                    warn!(error = %err, "OCI repository catalog refresh failed; keeping previous index live");
                }
            }
        }
    });
}
