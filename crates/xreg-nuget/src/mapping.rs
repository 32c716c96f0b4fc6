//! Translation from the NuGet v3 registration index to xRegistry
//! Resource/Version fields (spec §4.4 NuGet row, §4.5 NuGet notes).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use xreg_adapter::AdapterError;
use xreg_core::{EntityBase, EntityConfig, InvalidEntity, Resource, Version, Xid};

pub const GROUP_TYPE: &str = "dotnetregistries";
pub const GROUP_ID: &str = "nuget.org";
pub const RESOURCE_TYPE: &str = "packages";

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogEntry {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub authors: Option<Value>,
    #[serde(default)]
    #[serde(rename = "licenseExpression")]
    pub license_expression: Option<String>,
    #[serde(default)]
    #[serde(rename = "projectUrl")]
    pub project_url: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default = "default_listed")]
    pub listed: bool,
}

fn default_listed() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationLeaf {
    #[serde(rename = "catalogEntry")]
    pub catalog_entry: CatalogEntry,
    #[serde(default)]
    #[serde(rename = "packageContent")]
    pub package_content: Option<String>,
}

/// One page of a registration index. Small packages get every leaf
/// inlined directly; packages with many versions split across pages that
/// carry only `@id` (a pointer the caller must dereference separately).
#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationPage {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub items: Option<Vec<RegistrationLeaf>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistrationIndex {
    #[serde(default)]
    pub items: Vec<RegistrationPage>,
}

#[derive(Debug, Clone)]
pub struct NugetDoc {
    pub raw_id: String,
    pub versions: Vec<RegistrationLeaf>,
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn authors_list(authors: &Option<Value>) -> Option<Vec<String>> {
    match authors {
        Some(Value::String(s)) => Some(s.split(',').map(|a| a.trim().to_string()).collect()),
        Some(Value::Array(arr)) => Some(arr.iter().filter_map(Value::as_str).map(String::from).collect()),
        _ => None,
    }
}

/// Highest listed, non-prerelease version, falling back to the highest
/// listed version of any kind, falling back to the highest version
/// overall if nothing is listed (spec §4.5 NuGet notes).
pub fn default_version_id(doc: &NugetDoc) -> Option<String> {
    let listed_stable = doc
        .versions
        .iter()
        .filter(|v| v.catalog_entry.listed)
        .filter(|v| semver::Version::parse(&v.catalog_entry.version).map(|p| p.pre.is_empty()).unwrap_or(false))
        .max_by(|a, b| compare_versions(&a.catalog_entry.version, &b.catalog_entry.version));
    if let Some(v) = listed_stable {
        return Some(v.catalog_entry.version.clone());
    }
    let listed_any = doc
        .versions
        .iter()
        .filter(|v| v.catalog_entry.listed)
        .max_by(|a, b| compare_versions(&a.catalog_entry.version, &b.catalog_entry.version));
    if let Some(v) = listed_any {
        return Some(v.catalog_entry.version.clone());
    }
    doc.versions
        .iter()
        .max_by(|a, b| compare_versions(&a.catalog_entry.version, &b.catalog_entry.version))
        .map(|v| v.catalog_entry.version.clone())
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(pa), Ok(pb)) => pa.cmp(&pb),
        _ => a.cmp(b),
    }
}

pub fn resource_from_doc(doc: &NugetDoc, base_url: &str) -> Result<Resource, AdapterError> {
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;

    let latest = default_version_id(doc).and_then(|vid| {
        doc.versions.iter().find(|v| v.catalog_entry.version == vid)
    });

    let base = EntityBase::new(
        &resourcetype_xid,
        base_url,
        EntityConfig {
            id: doc.raw_id.clone(),
            name: Some(doc.raw_id.clone()),
            description: latest.and_then(|v| v.catalog_entry.description.clone()),
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(v) = latest {
        if let Some(license) = &v.catalog_entry.license_expression {
            base = base.with_extra("license", json!(license));
        }
        if let Some(project_url) = &v.catalog_entry.project_url {
            base = base.with_extra("homepage", json!(project_url));
        }
        if let Some(authors) = authors_list(&v.catalog_entry.authors) {
            base = base.with_extra("authors", json!(authors));
        }
    }

    let versions_xid = Xid::child_literal(&base.xid, "versions");
    Ok(Resource {
        versionsurl: xreg_core::xid::self_url(base_url, &versions_xid),
        versionscount: doc.versions.len() as u64,
        base,
    })
}

pub fn version_from_doc(doc: &NugetDoc, version_id: &str, base_url: &str) -> Result<Version, AdapterError> {
    let leaf = doc
        .versions
        .iter()
        .find(|v| v.catalog_entry.version == version_id)
        .ok_or_else(|| AdapterError::NotFound(format!("no such version '{version_id}'")))?;

    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let resource_xid = Xid::child(&resourcetype_xid, &doc.raw_id).map_err(invalid)?;
    let versions_xid = Xid::child_literal(&resource_xid, "versions");

    let created_at = leaf.catalog_entry.published.as_deref().and_then(parse_time);

    let base = EntityBase::new(
        &versions_xid,
        base_url,
        EntityConfig {
            id: version_id.to_string(),
            description: leaf.catalog_entry.description.clone(),
            created_at,
            modified_at: created_at,
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(license) = &leaf.catalog_entry.license_expression {
        base = base.with_extra("license", json!(license));
    }
    if let Some(content) = &leaf.package_content {
        base = base.with_extra("downloadurl", json!(content));
    }
    if let Some(authors) = authors_list(&leaf.catalog_entry.authors) {
        base = base.with_extra("authors", json!(authors));
    }
    base = base.with_extra("listed", json!(leaf.catalog_entry.listed));

    let isdefault = default_version_id(doc).as_deref() == Some(version_id);
    Ok(Version {
        base,
        versionid: version_id.to_string(),
        isdefault,
    })
}

pub fn list_version_ids_newest_first(doc: &NugetDoc) -> Vec<String> {
    let mut ids: Vec<&str> = doc.versions.iter().map(|v| v.catalog_entry.version.as_str()).collect();
    ids.sort_by(|a, b| compare_versions(b, a));
    ids.into_iter().map(String::from).collect()
}

fn invalid(e: InvalidEntity) -> AdapterError {
    AdapterError::InvalidEntity(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authors_splits_comma_separated_string() {
        assert_eq!(
            authors_list(&Some(Value::String("James Newton-King, Contributors".into()))),
            Some(vec!["James Newton-King".to_string(), "Contributors".to_string()])
        );
    }

    #[test]
    fn default_version_prefers_listed_stable() {
        let doc = NugetDoc {
            raw_id: "Demo.Pkg".into(),
            versions: vec![
                RegistrationLeaf {
                    catalog_entry: CatalogEntry {
                        id: "Demo.Pkg".into(),
                        version: "2.0.0-beta".into(),
                        description: None,
                        authors: None,
                        license_expression: None,
                        project_url: None,
                        published: None,
                        listed: true,
                    },
                    package_content: None,
                },
                RegistrationLeaf {
                    catalog_entry: CatalogEntry {
                        id: "Demo.Pkg".into(),
                        version: "1.5.0".into(),
                        description: None,
                        authors: None,
                        license_expression: None,
                        project_url: None,
                        published: None,
                        listed: true,
                    },
                    package_content: None,
                },
            ],
        };
        assert_eq!(default_version_id(&doc).as_deref(), Some("1.5.0"));
    }
}
