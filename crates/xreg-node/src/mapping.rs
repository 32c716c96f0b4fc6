//! Translation from an npm registry package document to xRegistry
//! Resource/Version fields (spec §4.4 Node row, §4.5).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use xreg_adapter::AdapterError;
use xreg_core::{EntityBase, EntityConfig, InvalidEntity, Resource, Version, Xid};

pub const GROUP_TYPE: &str = "noderegistries";
pub const GROUP_ID: &str = "npmjs.org";
pub const RESOURCE_TYPE: &str = "packages";

/// Scoped package names (`@scope/pkg`) contain a `/`, which an xid path
/// segment cannot (spec §4.4 says "url-encoded in paths", but percent
/// signs are not xid-legal either). We substitute `~` for `/`, since npm
/// names never themselves contain `~`, and restore the original name
/// verbatim on the resource's `name` attribute.
pub fn encode_resource_id(raw_name: &str) -> String {
    raw_name.replace('/', "~")
}

pub fn decode_resource_id(resource_id: &str) -> String {
    resource_id.replace('~', "/")
}

#[derive(Debug, Deserialize, Clone)]
pub struct NpmPackageDoc {
    pub name: String,
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub versions: BTreeMap<String, NpmVersionDoc>,
    #[serde(default)]
    pub time: BTreeMap<String, String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub license: Option<Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NpmVersionDoc {
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<Value>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dist: Option<NpmDist>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NpmDist {
    #[serde(default)]
    pub tarball: Option<String>,
    #[serde(default)]
    pub shasum: Option<String>,
    #[serde(default)]
    pub integrity: Option<String>,
}

fn license_string(license: &Option<Value>) -> Option<String> {
    match license {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(map)) => map.get("type").and_then(Value::as_str).map(String::from),
        _ => None,
    }
}

fn parse_time(time: &BTreeMap<String, String>, key: &str) -> Option<DateTime<Utc>> {
    time.get(key)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// npm registry's version ordering for "latest stable": highest semver,
/// ignoring versions that fail to parse (prerelease-only packages with no
/// parseable version are simply excluded from consideration).
pub fn highest_semver<'a>(versions: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    versions
        .filter_map(|v| semver::Version::parse(v).ok().map(|parsed| (parsed, v)))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, v)| v)
}

pub fn default_version_id(doc: &NpmPackageDoc) -> Option<String> {
    if let Some(latest) = doc.dist_tags.get("latest") {
        return Some(latest.clone());
    }
    highest_semver(doc.versions.keys().map(String::as_str)).map(String::from)
}

pub fn resource_from_doc(doc: &NpmPackageDoc, base_url: &str) -> Result<Resource, AdapterError> {
    let resource_id = encode_resource_id(&doc.name);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}"))
        .map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let created_at = parse_time(&doc.time, "created");
    let modified_at = parse_time(&doc.time, "modified");

    let base = EntityBase::new(
        &resourcetype_xid,
        base_url,
        EntityConfig {
            id: resource_id.clone(),
            name: Some(doc.name.clone()),
            description: doc.description.clone(),
            created_at,
            modified_at,
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(license) = license_string(&doc.license) {
        base = base.with_extra("license", json!(license));
    }
    if let Some(homepage) = &doc.homepage {
        base = base.with_extra("homepage", json!(homepage));
    }

    let versions_xid = Xid::child_literal(&base.xid, "versions");
    Ok(Resource {
        versionsurl: xreg_core::xid::self_url(base_url, &versions_xid),
        versionscount: doc.versions.len() as u64,
        base,
    })
}

pub fn version_from_doc(
    doc: &NpmPackageDoc,
    version_id: &str,
    base_url: &str,
) -> Result<Version, AdapterError> {
    let vdoc = doc
        .versions
        .get(version_id)
        .ok_or_else(|| AdapterError::NotFound(format!("no such version '{version_id}'")))?;

    let resource_id = encode_resource_id(&doc.name);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let resource_xid = Xid::child(&resourcetype_xid, &resource_id).map_err(invalid)?;
    let versions_xid = Xid::child_literal(&resource_xid, "versions");

    let created_at = parse_time(&doc.time, version_id);

    let base = EntityBase::new(
        &versions_xid,
        base_url,
        EntityConfig {
            id: version_id.to_string(),
            description: vdoc.description.clone(),
            created_at,
            modified_at: created_at,
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    if let Some(license) = license_string(&vdoc.license).or_else(|| license_string(&doc.license)) {
        base = base.with_extra("license", json!(license));
    }
    if let Some(dist) = &vdoc.dist {
        if let Some(tarball) = &dist.tarball {
            base = base.with_extra("downloadurl", json!(tarball));
        }
        if let Some(integrity) = &dist.integrity {
            base = base.with_extra("integrity", json!(integrity));
        }
    }
    if !vdoc.dependencies.is_empty() {
        base = base.with_extra("dependencies", json!(vdoc.dependencies));
    }

    let isdefault = default_version_id(doc).as_deref() == Some(version_id);
    Ok(Version {
        base,
        versionid: version_id.to_string(),
        isdefault,
    })
}

pub fn list_version_ids_newest_first(doc: &NpmPackageDoc) -> Vec<String> {
    let mut ids: Vec<&str> = doc.versions.keys().map(String::as_str).collect();
    ids.sort_by(|a, b| match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(pa), Ok(pb)) => pb.cmp(&pa),
        _ => b.cmp(a),
    });
    ids.into_iter().map(String::from).collect()
}

fn invalid(e: InvalidEntity) -> AdapterError {
    AdapterError::InvalidEntity(e)
}
