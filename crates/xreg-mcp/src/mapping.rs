//! Translation from MCP server-registry entries to xRegistry
//! Resource/Version fields (spec §4.4 MCP row, §4.5 MCP notes).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use xreg_adapter::AdapterError;
use xreg_core::{EntityBase, EntityConfig, InvalidEntity, Resource, Version, Xid};

pub const GROUP_TYPE: &str = "mcpproviders";
pub const RESOURCE_TYPE: &str = "servers";

/// Sanitizes an upstream MCP server name (`io.github.acme/widget-tool`)
/// into a legal xid path segment: slashes become `_`, the whole string is
/// lowercased, and any character outside `[a-z0-9._-]` is replaced with
/// `_` (spec.md's ID-translation table, MCP row).
pub fn sanitize_name(raw_name: &str) -> String {
    raw_name
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c == '/' { '_' } else { c })
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct McpRepository {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct McpVersionDetail {
    pub version: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub is_latest: bool,
}

/// One catalog entry as returned by the provider's server list; a single
/// upstream entry represents a single published version of a named server.
#[derive(Debug, Deserialize, Clone)]
pub struct McpServerEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub repository: Option<McpRepository>,
    pub version_detail: McpVersionDetail,
}

/// All published versions of one named server, aggregated from the
/// provider's paginated catalog (spec §4.5: "upstream is a provider's MCP
/// server listing").
#[derive(Debug, Clone)]
pub struct McpDoc {
    pub raw_name: String,
    pub entries: Vec<McpServerEntry>,
}

fn parse_date(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// The upstream `is_latest` flag, taken verbatim rather than recomputed
/// (spec §4.5: "version selection uses the upstream `isLatest` flag
/// verbatim"). Falls back to the highest-dated release if no entry is
/// flagged latest.
pub fn default_version_id(doc: &McpDoc) -> Option<String> {
    if let Some(entry) = doc.entries.iter().find(|e| e.version_detail.is_latest) {
        return Some(entry.version_detail.version.clone());
    }
    doc.entries
        .iter()
        .max_by_key(|e| parse_date(&e.version_detail.release_date))
        .map(|e| e.version_detail.version.clone())
}

pub fn resource_from_doc(doc: &McpDoc, provider_namespace: &str, base_url: &str) -> Result<Resource, AdapterError> {
    let resource_id = sanitize_name(&doc.raw_name);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{provider_namespace}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;

    let description = doc.entries.first().and_then(|e| e.description.clone());

    let base = EntityBase::new(
        &resourcetype_xid,
        base_url,
        EntityConfig {
            id: resource_id,
            name: Some(doc.raw_name.clone()),
            description,
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(repo) = doc.entries.first().and_then(|e| e.repository.as_ref()) {
        if let Some(url) = &repo.url {
            base = base.with_extra("repositoryurl", json!(url));
        }
        if let Some(source) = &repo.source {
            base = base.with_extra("repositorysource", json!(source));
        }
    }

    let versions_xid = Xid::child_literal(&base.xid, "versions");
    Ok(Resource {
        versionsurl: xreg_core::xid::self_url(base_url, &versions_xid),
        versionscount: doc.entries.len() as u64,
        base,
    })
}

pub fn version_from_doc(
    doc: &McpDoc,
    provider_namespace: &str,
    version_id: &str,
    base_url: &str,
) -> Result<Version, AdapterError> {
    let entry = doc
        .entries
        .iter()
        .find(|e| e.version_detail.version == version_id)
        .ok_or_else(|| AdapterError::NotFound(format!("no such version '{version_id}'")))?;

    let resource_id = sanitize_name(&doc.raw_name);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{provider_namespace}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let resource_xid = Xid::child(&resourcetype_xid, &resource_id).map_err(invalid)?;
    let versions_xid = Xid::child_literal(&resource_xid, "versions");

    let base = EntityBase::new(
        &versions_xid,
        base_url,
        EntityConfig {
            id: version_id.to_string(),
            description: entry.description.clone(),
            created_at: parse_date(&entry.version_detail.release_date),
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(repo) = &entry.repository {
        if let Some(url) = &repo.url {
            base = base.with_extra("repositoryurl", json!(url));
        }
    }

    Ok(Version {
        base,
        versionid: version_id.to_string(),
        isdefault: entry.version_detail.is_latest,
    })
}

pub fn list_version_ids_newest_first(doc: &McpDoc) -> Vec<String> {
    let mut entries = doc.entries.clone();
    entries.sort_by_key(|e| std::cmp::Reverse(parse_date(&e.version_detail.release_date)));
    entries.into_iter().map(|e| e.version_detail.version).collect()
}

fn invalid(e: InvalidEntity) -> AdapterError {
    AdapterError::InvalidEntity(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: &str, is_latest: bool, date: &str) -> McpServerEntry {
        McpServerEntry {
            name: "io.github.acme/widget-tool".to_string(),
            description: Some("a widget tool".to_string()),
            repository: Some(McpRepository {
                url: Some("https://github.com/acme/widget-tool".to_string()),
                source: Some("github".to_string()),
            }),
            version_detail: McpVersionDetail {
                version: version.to_string(),
                release_date: Some(date.to_string()),
                is_latest,
            },
        }
    }

    #[test]
    fn sanitizes_slashes_and_case() {
        assert_eq!(sanitize_name("io.github.Acme/Widget Tool"), "io.github.acme_widget_tool");
    }

    #[test]
    fn default_version_honors_upstream_is_latest_flag_over_dates() {
        let doc = McpDoc {
            raw_name: "io.github.acme/widget-tool".to_string(),
            entries: vec![
                entry("2.0.0", false, "2026-01-01T00:00:00Z"),
                entry("1.0.0", true, "2025-01-01T00:00:00Z"),
            ],
        };
        assert_eq!(default_version_id(&doc).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn default_version_falls_back_to_newest_release_date_when_none_flagged_latest() {
        let doc = McpDoc {
            raw_name: "io.github.acme/widget-tool".to_string(),
            entries: vec![
                entry("1.0.0", false, "2025-01-01T00:00:00Z"),
                entry("2.0.0", false, "2026-01-01T00:00:00Z"),
            ],
        };
        assert_eq!(default_version_id(&doc).as_deref(), Some("2.0.0"));
    }
}
