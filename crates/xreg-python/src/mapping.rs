//! Translation from a PyPI JSON API package document to xRegistry
//! Resource/Version fields (spec §4.4 Python row, §4.5 Python/PyPI notes).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use xreg_adapter::AdapterError;
use xreg_core::{EntityBase, EntityConfig, InvalidEntity, Resource, Version, Xid};

pub const GROUP_TYPE: &str = "pythonregistries";
pub const GROUP_ID: &str = "pypi.org";
pub const RESOURCE_TYPE: &str = "packages";

/// PEP 503 normalization: lowercase, runs of `-`/`_`/`.` collapsed to a
/// single `-`. PyPI treats `Flask_Babel`, `flask-babel` and `flask.babel`
/// as the same project; the normalized form is what we use as the
/// resource id (spec §4.4 Python row).
pub fn normalize(raw_name: &str) -> String {
    let mut out = String::with_capacity(raw_name.len());
    let mut last_was_sep = false;
    for c in raw_name.chars() {
        if c == '-' || c == '_' || c == '.' {
            if !last_was_sep && !out.is_empty() {
                out.push('-');
            }
            last_was_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_was_sep = false;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PypiInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub home_page: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PypiUrlEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub upload_time_iso_8601: Option<String>,
    #[serde(default)]
    pub digests: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PypiDoc {
    pub info: PypiInfo,
    #[serde(default)]
    pub releases: BTreeMap<String, Vec<PypiUrlEntry>>,
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Earliest upload time across a release's distribution files, used as
/// that version's `createdat`.
fn release_created_at(entries: &[PypiUrlEntry]) -> Option<DateTime<Utc>> {
    entries
        .iter()
        .filter_map(|e| e.upload_time_iso_8601.as_deref().and_then(parse_time))
        .min()
}

pub fn default_version_id(doc: &PypiDoc) -> Option<String> {
    if doc.releases.contains_key(&doc.info.version) {
        Some(doc.info.version.clone())
    } else if doc.releases.is_empty() {
        None
    } else {
        highest_version(doc.releases.keys().map(String::as_str))
    }
}

/// PyPI release versions are not guaranteed strict semver (PEP 440 allows
/// epochs, post-releases, local versions). We fall back to semver
/// comparison when all versions parse as semver, else plain string
/// ordering, mirroring the filter engine's own numeric-vs-string rule
/// (spec §9 Open Questions default).
fn highest_version<'a>(versions: impl Iterator<Item = &'a str>) -> Option<String> {
    let collected: Vec<&str> = versions.collect();
    if let Some(best) = collected
        .iter()
        .filter_map(|v| semver::Version::parse(v).ok().map(|parsed| (parsed, *v)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
    {
        return Some(best.1.to_string());
    }
    collected.iter().max().map(|v| v.to_string())
}

pub fn resource_from_doc(doc: &PypiDoc, base_url: &str) -> Result<Resource, AdapterError> {
    let resource_id = normalize(&doc.info.name);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;

    let base = EntityBase::new(
        &resourcetype_xid,
        base_url,
        EntityConfig {
            id: resource_id,
            name: Some(doc.info.name.clone()),
            description: doc.info.summary.clone(),
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(license) = &doc.info.license {
        if !license.is_empty() {
            base = base.with_extra("license", json!(license));
        }
    }
    if let Some(homepage) = &doc.info.home_page {
        if !homepage.is_empty() {
            base = base.with_extra("homepage", json!(homepage));
        }
    }
    if let Some(author) = &doc.info.author {
        if !author.is_empty() {
            base = base.with_extra("authors", json!([author]));
        }
    }

    let versions_xid = Xid::child_literal(&base.xid, "versions");
    Ok(Resource {
        versionsurl: xreg_core::xid::self_url(base_url, &versions_xid),
        versionscount: doc.releases.len() as u64,
        base,
    })
}

pub fn version_from_doc(doc: &PypiDoc, version_id: &str, base_url: &str) -> Result<Version, AdapterError> {
    let entries = doc
        .releases
        .get(version_id)
        .ok_or_else(|| AdapterError::NotFound(format!("no such version '{version_id}'")))?;

    let resource_id = normalize(&doc.info.name);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let resource_xid = Xid::child(&resourcetype_xid, &resource_id).map_err(invalid)?;
    let versions_xid = Xid::child_literal(&resource_xid, "versions");

    let created_at = release_created_at(entries);

    let base = EntityBase::new(
        &versions_xid,
        base_url,
        EntityConfig {
            id: version_id.to_string(),
            description: if version_id == doc.info.version {
                doc.info.summary.clone()
            } else {
                None
            },
            created_at,
            modified_at: created_at,
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(entry) = entries.iter().find(|e| e.url.is_some()) {
        if let Some(url) = &entry.url {
            base = base.with_extra("downloadurl", json!(url));
        }
        if let Some(sha256) = entry.digests.get("sha256") {
            base = base.with_extra("sha256", json!(sha256));
        }
    }
    if version_id == doc.info.version {
        if let Some(requires) = &doc.info.requires_dist {
            if !requires.is_empty() {
                base = base.with_extra("dependencies", json!(requires));
            }
        }
    }

    let isdefault = default_version_id(doc).as_deref() == Some(version_id);
    Ok(Version {
        base,
        versionid: version_id.to_string(),
        isdefault,
    })
}

pub fn list_version_ids_newest_first(doc: &PypiDoc) -> Vec<String> {
    let mut ids: Vec<(String, Option<DateTime<Utc>>)> = doc
        .releases
        .iter()
        .map(|(v, entries)| (v.clone(), release_created_at(entries)))
        .collect();
    ids.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    ids.into_iter().map(|(v, _)| v).collect()
}

fn invalid(e: InvalidEntity) -> AdapterError {
    AdapterError::InvalidEntity(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_per_pep_503() {
        assert_eq!(normalize("Flask_Babel"), "flask-babel");
        assert_eq!(normalize("flask.babel"), "flask-babel");
        assert_eq!(normalize("flask--babel__x"), "flask-babel-x");
    }
}
