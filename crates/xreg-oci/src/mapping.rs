//! Translation from OCI Distribution v2 catalog/tag responses to
//! xRegistry Resource/Version fields (spec §4.4 OCI row, §4.5 OCI notes).

use xreg_adapter::AdapterError;
use xreg_core::{EntityBase, EntityConfig, InvalidEntity, Resource, Version, Xid};

pub const GROUP_TYPE: &str = "containerregistries";
pub const RESOURCE_TYPE: &str = "images";

/// A repository path (`library/nginx`) contains `/`, which an xid path
/// segment cannot; substituted with `~` the same way the Node adapter
/// encodes scoped package slashes.
pub fn encode_resource_id(repository: &str) -> String {
    repository.replace('/', "~")
}

pub fn decode_resource_id(resource_id: &str) -> String {
    resource_id.replace('~', "/")
}

#[derive(Debug, Clone)]
pub struct OciDoc {
    pub repository: String,
    pub tags: Vec<String>,
}

/// `latest` if present, else the lexicographically highest tag (spec
/// §4.5 OCI notes).
pub fn default_version_id(doc: &OciDoc) -> Option<String> {
    if doc.tags.iter().any(|t| t == "latest") {
        return Some("latest".to_string());
    }
    doc.tags.iter().max().cloned()
}

pub fn resource_from_doc(doc: &OciDoc, group_id: &str, base_url: &str) -> Result<Resource, AdapterError> {
    let resource_id = encode_resource_id(&doc.repository);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{group_id}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;

    let base = EntityBase::new(
        &resourcetype_xid,
        base_url,
        EntityConfig {
            id: resource_id,
            name: Some(doc.repository.clone()),
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let versions_xid = Xid::child_literal(&base.xid, "versions");
    Ok(Resource {
        versionsurl: xreg_core::xid::self_url(base_url, &versions_xid),
        versionscount: doc.tags.len() as u64,
        base,
    })
}

pub fn version_from_doc(
    doc: &OciDoc,
    group_id: &str,
    version_id: &str,
    base_url: &str,
) -> Result<Version, AdapterError> {
    if !doc.tags.iter().any(|t| t == version_id) {
        return Err(AdapterError::NotFound(format!("no such tag '{version_id}'")));
    }

    let resource_id = encode_resource_id(&doc.repository);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{group_id}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let resource_xid = Xid::child(&resourcetype_xid, &resource_id).map_err(invalid)?;
    let versions_xid = Xid::child_literal(&resource_xid, "versions");

    let base = EntityBase::new(
        &versions_xid,
        base_url,
        EntityConfig {
            id: version_id.to_string(),
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    base = base.with_extra("reference", serde_json::json!(format!("{}:{}", doc.repository, version_id)));

    let isdefault = default_version_id(doc).as_deref() == Some(version_id);
    Ok(Version {
        base,
        versionid: version_id.to_string(),
        isdefault,
    })
}

pub fn list_version_ids_newest_first(doc: &OciDoc) -> Vec<String> {
    let mut tags = doc.tags.clone();
    tags.sort();
    tags.reverse();
    tags
}

fn invalid(e: InvalidEntity) -> AdapterError {
    AdapterError::InvalidEntity(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_version_prefers_latest_tag() {
        let doc = OciDoc {
            repository: "library/nginx".into(),
            tags: vec!["1.25".into(), "latest".into(), "1.24".into()],
        };
        assert_eq!(default_version_id(&doc).as_deref(), Some("latest"));
    }

    #[test]
    fn default_version_falls_back_to_lexicographically_highest_tag() {
        let doc = OciDoc {
            repository: "library/nginx".into(),
            tags: vec!["1.25".into(), "1.9".into()],
        };
        assert_eq!(default_version_id(&doc).as_deref(), Some("1.9"));
    }

    #[test]
    fn encode_round_trips_repository_path() {
        let encoded = encode_resource_id("library/nginx");
        assert_eq!(encoded, "library~nginx");
        assert_eq!(decode_resource_id(&encoded), "library/nginx");
    }
}
