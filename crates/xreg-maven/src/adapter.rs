//! `MavenAdapter`: the Maven Central ecosystem's `EcosystemAdapter`
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

use crate::mapping::{self, GavSearchResponse, MavenDoc};

const DEFAULT_SEARCH_BASE: &str = "https://search.maven.org/solrsearch/select";
const DEFAULT_REPO_BASE: &str = "https://repo1.maven.org/maven2";
const DEFAULT_CATALOG_ROWS: u32 = 2_000;

pub struct MavenAdapter {
    fetcher: Arc<Fetcher>,
    cache: MetadataCache<Arc<MavenDoc>>,
    index: Arc<NameIndex>,
    search_base: String,
    repo_base: String,
    max_limit: u64,
}

#[derive(Debug, Deserialize)]
struct PackageSearchDoc {
    #[serde(default)]
    #[serde(rename = "latestVersion")]
    latest_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackageSearchBody {
    #[serde(default)]
    docs: Vec<PackageSearchDoc>,
}

#[derive(Debug, Deserialize)]
struct PackageSearchResponse {
    response: PackageSearchBody,
}

impl MavenAdapter {
    async fn fetch_doc(&self, group_id: &str, artifact_id: &str) -> Result<Arc<MavenDoc>, AdapterError> {
        let resource_id = mapping::encode_resource_id(group_id, artifact_id);
        let key = CacheKey::resource("maven", &resource_id);
        let fetcher = self.fetcher.clone();
        let search_base = self.search_base.clone();
        let repo_base = self.repo_base.clone();
        let group_id = group_id.to_string();
        let artifact_id = artifact_id.to_string();
        self.cache
            .get_or_fetch(key, || async move {
                let gav_url = format!(
                    "{search_base}?q=g:%22{}%22+AND+a:%22{}%22&core=gav&rows=200&wt=json",
                    urlencoding::encode(&group_id),
                    urlencoding::encode(&artifact_id)
                );
                let gav: GavSearchResponse = fetcher.get_json(&gav_url, None).await?;
                if gav.response.docs.is_empty() {
                    return Err(UpstreamError::Http {
                        status: 404,
                        body: String::new(),
                    });
                }

                let pkg_url = format!(
                    "{search_base}?q=g:%22{}%22+AND+a:%22{}%22&rows=1&wt=json",
                    urlencoding::encode(&group_id),
                    urlencoding::encode(&artifact_id)
                );
                let latest_version = fetcher
                    .get_json::<PackageSearchResponse>(&pkg_url, None)
                    .await
                    .ok()
                    .and_then(|r| r.response.docs.into_iter().next())
                    .and_then(|d| d.latest_version);

                let mut doc = MavenDoc {
                    group_id: group_id.clone(),
                    artifact_id: artifact_id.clone(),
                    versions: gav.response.docs,
                    latest_version,
                    license: None,
                };

                if let Some(default_version) = mapping::default_version_id(&doc) {
                    let pom_url = format!(
                        "{repo_base}/{}/{}/{}/{}-{}.pom",
                        group_id.replace('.', "/"),
                        artifact_id,
                        default_version,
                        artifact_id,
                        default_version
                    );
                    if let Ok(bytes) = fetcher.get_bytes(&pom_url, None).await {
                        if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                            doc.license = mapping::extract_license_from_pom(&text);
                        }
                    }
                }

                Ok(Arc::new(doc))
            })
            .await
            .map_err(AdapterError::from_upstream)
    }
}

#[async_trait]
impl xreg_adapter::EcosystemAdapter for MavenAdapter {
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
        "Maven Central"
    }

    fn name_index(&self) -> Arc<NameIndex> {
        self.index.clone()
    }

    fn max_limit(&self) -> u64 {
        self.max_limit
    }

    async fn fetch_resource(&self, resource_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
        let (g, a) = mapping::decode_resource_id(resource_id)?;
        let doc = self.fetch_doc(&g, &a).await?;
        mapping::resource_from_doc(&doc, base_url)
    }

    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError> {
        let (g, a) = mapping::decode_resource_id(resource_id)?;
        let doc = self.fetch_doc(&g, &a).await?;
        mapping::version_from_doc(&doc, version_id, base_url)
    }

    async fn list_versions(&self, resource_id: &str, base_url: &str) -> Result<Vec<Version>, AdapterError> {
        let (g, a) = mapping::decode_resource_id(resource_id)?;
        let doc = self.fetch_doc(&g, &a).await?;
        mapping::list_version_ids_newest_first(&doc)
            .into_iter()
            .map(|vid| mapping::version_from_doc(&doc, &vid, base_url))
            .collect()
    }

    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError> {
        let (g, a) = mapping::decode_resource_id(resource_id)?;
        let doc = self.fetch_doc(&g, &a).await?;
        Ok(mapping::default_version_id(&doc))
    }

    fn model_extras(&self) -> Value {
        json!({ "attributes": ["groupid", "artifactid", "license", "downloadurl"] })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    g: Option<String>,
    #[serde(default)]
    a: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogBody {
    #[serde(default)]
    docs: Vec<CatalogDoc>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    response: CatalogBody,
}

/// Streams a bounded slice of Maven Central's artifact catalog (spec
/// §4.5's "Maven Central search" bulk catalog source) as
/// `groupId~artifactId` resource ids.
async fn fetch_catalog_names(fetcher: &Fetcher, search_base: &str) -> Result<Vec<String>, UpstreamError> {
    let url = format!("{search_base}?q=*:*&rows={DEFAULT_CATALOG_ROWS}&wt=json");
    let resp: CatalogResponse = fetcher.get_json(&url, None).await?;
    Ok(resp
        .response
        .docs
        .into_iter()
        .filter_map(|d| match (d.g, d.a) {
            (Some(g), Some(a)) => Some(mapping::encode_resource_id(&g, &a)),
            _ => None,
        })
        .collect())
}

/// Builds a ready-to-serve `MavenAdapter`, per the same fallback-to-empty
/// readiness contract as the Node adapter (spec §4.4, §4.8).
pub async fn build(config: &AdapterConfig) -> Arc<MavenAdapter> {
    let fetcher = Arc::new(Fetcher::new(
        config.fetch.to_upstream(config.http.request_timeout_secs),
    ));
    let names = match fetch_catalog_names(&fetcher, DEFAULT_SEARCH_BASE).await {
        Ok(names) => {
            info!(count = names.len(), "loaded Maven Central name index");
            names
        }
        Err(err) => {
            warn!(error = %err, "failed to load Maven Central name index at startup; starting empty");
            Vec::new()
        }
    };
    let index = Arc::new(NameIndex::new(names));
    let cache = MetadataCache::new(config.cache.to_upstream());

    let adapter = Arc::new(MavenAdapter {
        fetcher: fetcher.clone(),
        cache,
        index: index.clone(),
        search_base: DEFAULT_SEARCH_BASE.to_string(),
        repo_base: DEFAULT_REPO_BASE.to_string(),
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
            match fetch_catalog_names(&fetcher, DEFAULT_SEARCH_BASE).await {
                Ok(names) => {
                    info!(count = names.len(), "refreshed Maven Central name index");
                    index.swap(names);
                }
                Err(err) => {
                    warn!(error = %err, "Maven Central name index refresh failed; keeping previous index live");
                }
            }
        }
    });
}
