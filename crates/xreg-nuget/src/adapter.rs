//! `NuGetAdapter`: the .NET/NuGet ecosystem's `EcosystemAdapter`
//! implementation, wiring `mapping.rs`'s translation functions to the
//! shared fetcher, cache and name index (spec §4.5).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use xreg_adapter::{AdapterConfig, AdapterError};
use xreg_core::{Resource, Version};
use xreg_upstream::{CacheKey, Fetcher, MetadataCache, NameIndex, UpstreamError};

use crate::mapping::{self, NugetDoc, RegistrationIndex, RegistrationPage};

const DEFAULT_REGISTRATION_BASE: &str = "https://api.nuget.org/v3/registration5-semver1";
const DEFAULT_SEARCH_URL: &str = "https://azuresearch-usnc.nuget.org/query?take=2000";

pub struct NuGetAdapter {
    fetcher: Arc<Fetcher>,
    cache: MetadataCache<Arc<NugetDoc>>,
    index: Arc<NameIndex>,
    registration_base: String,
    max_limit: u64,
}

impl NuGetAdapter {
    async fn fetch_doc(&self, raw_id: &str) -> Result<Arc<NugetDoc>, AdapterError> {
        let key = CacheKey::resource("nuget", raw_id);
        let fetcher = self.fetcher.clone();
        let url = format!("{}/{}/index.json", self.registration_base, raw_id.to_lowercase());
        let raw_id = raw_id.to_string();
        self.cache
            .get_or_fetch(key, || async move {
                let index: RegistrationIndex = fetcher.get_json(&url, None).await?;
                let mut versions = Vec::new();
                for page in index.items {
                    match page.items {
                        Some(leaves) => versions.extend(leaves),
                        None => {
                            if let Ok(fetched) = fetcher.get_json::<RegistrationPage>(&page.id, None).await {
                                if let Some(leaves) = fetched.items {
                                    versions.extend(leaves);
                                }
                            }
                        }
                    }
                }
                if versions.is_empty() {
                    return Err(UpstreamError::Http {
                        status: 404,
                        body: String::new(),
                    });
                }
                Ok(Arc::new(NugetDoc { raw_id, versions }))
            })
            .await
            .map_err(AdapterError::from_upstream)
    }
}

#[async_trait]
impl xreg_adapter::EcosystemAdapter for NuGetAdapter {
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
        "NuGet Gallery"
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
        json!({ "attributes": ["license", "homepage", "authors", "downloadurl", "listed"] })
    }
}

#[derive(Debug, Deserialize)]
struct SearchDoc {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<SearchDoc>,
}

/// Streams a bounded slice of NuGet's package catalog from the search
/// query service (spec §4.5's "NuGet v3 flat container + registration
/// index" note; the search service is used here in place of streaming the
/// multi-page catalog, matching the abstraction the Node adapter uses for
/// its own oversized bulk endpoint).
async fn fetch_catalog_names(fetcher: &Fetcher, search_url: &str) -> Result<Vec<String>, UpstreamError> {
    let resp: SearchResponse = fetcher.get_json(search_url, None).await?;
    Ok(resp.data.into_iter().map(|d| d.id).collect())
}

pub async fn build(config: &AdapterConfig) -> Arc<NuGetAdapter> {
    let fetcher = Arc::new(Fetcher::new(
        config.fetch.to_upstream(config.http.request_timeout_secs),
    ));
    let names = match fetch_catalog_names(&fetcher, DEFAULT_SEARCH_URL).await {
        Ok(names) => {
            info!(count = names.len(), "loaded NuGet name index");
            names
        }
        Err(err) => {
            warn!(error = %err, "failed to load NuGet name index at startup; starting empty");
            Vec::new()
        }
    };
    let index = Arc::new(NameIndex::new(names));
    let cache = MetadataCache::new(config.cache.to_upstream());

    let adapter = Arc::new(NuGetAdapter {
        fetcher: fetcher.clone(),
        cache,
        index: index.clone(),
        registration_base: DEFAULT_REGISTRATION_BASE.to_string(),
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
            match fetch_catalog_names(&fetcher, DEFAULT_SEARCH_URL).await {
                Ok(names) => {
                    info!(count = names.len(), "refreshed NuGet name index");
                    index.swap(names);
                }
                Err(err) => {
                    warn!(error = %err, "NuGet name index refresh failed; keeping previous index live");
                }
            }
        }
    });
}
