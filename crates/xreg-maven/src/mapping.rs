//! Translation from Maven Central search results (plus an optional POM
//! fetch for license extras) to xRegistry Resource/Version fields (spec
//! §4.4 Maven row, §4.5 Maven notes).

use std::cmp::Ordering;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use xreg_adapter::AdapterError;
use xreg_core::{EntityBase, EntityConfig, InvalidEntity, Resource, Version, Xid};

pub const GROUP_TYPE: &str = "javaregistries";
pub const GROUP_ID: &str = "maven-central";
pub const RESOURCE_TYPE: &str = "packages";

/// `groupId:artifactId` has no illegal xid characters in either half, but
/// the pair must live in a single path segment; we join with `~` (never
/// legal in a Maven groupId/artifactId) the same way the Node adapter
/// encodes scoped package slashes.
pub fn encode_resource_id(group_id: &str, artifact_id: &str) -> String {
    format!("{group_id}~{artifact_id}")
}

pub fn decode_resource_id(resource_id: &str) -> Result<(String, String), AdapterError> {
    resource_id
        .split_once('~')
        .map(|(g, a)| (g.to_string(), a.to_string()))
        .ok_or_else(|| AdapterError::BadRequest(format!("malformed Maven resource id '{resource_id}'")))
}

#[derive(Debug, Deserialize, Clone)]
pub struct GavDoc {
    pub v: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GavResponseBody {
    #[serde(default)]
    pub docs: Vec<GavDoc>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GavSearchResponse {
    pub response: GavResponseBody,
}

#[derive(Debug, Clone)]
pub struct MavenDoc {
    pub group_id: String,
    pub artifact_id: String,
    pub versions: Vec<GavDoc>,
    pub latest_version: Option<String>,
    pub license: Option<String>,
}

fn timestamp_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Splits a Maven version string into alternating numeric/alphabetic
/// tokens, the way Maven's own `ComparableVersion` does, so `1.10.0`
/// compares greater than `1.9.0` instead of sorting as a string.
fn tokenize(version: &str) -> Vec<Result<u64, String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit: Option<bool> = None;
    for c in version.chars() {
        if c == '.' || c == '-' || c == '_' {
            if !current.is_empty() {
                tokens.push(finalize_token(&current));
                current.clear();
            }
            current_is_digit = None;
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if current_is_digit.is_some() && current_is_digit != Some(is_digit) {
            tokens.push(finalize_token(&current));
            current.clear();
        }
        current.push(c);
        current_is_digit = Some(is_digit);
    }
    if !current.is_empty() {
        tokens.push(finalize_token(&current));
    }
    tokens
}

fn finalize_token(s: &str) -> Result<u64, String> {
    s.parse::<u64>().map_err(|_| s.to_ascii_lowercase())
}

/// `-SNAPSHOT`/`-alpha`/`-beta`/`-rc` qualifiers sort below an unqualified
/// release of the same numeric prefix; everything else falls back to
/// lexical comparison, matching Maven's own qualifier ranking loosely
/// enough for deterministic "highest release" selection (spec §9 Open
/// Question: Maven version ordering, resolved in DESIGN.md).
fn qualifier_rank(q: &str) -> i32 {
    match q.to_ascii_lowercase().as_str() {
        "snapshot" => -100,
        "alpha" => -4,
        "beta" => -3,
        "milestone" | "m" => -2,
        "rc" | "cr" => -1,
        "" | "final" | "ga" | "release" => 0,
        "sp" => 1,
        _ => -50,
    }
}

pub fn compare_maven_versions(a: &str, b: &str) -> Ordering {
    let ta = tokenize(a);
    let tb = tokenize(b);
    for i in 0..ta.len().max(tb.len()) {
        let left = ta.get(i);
        let right = tb.get(i);
        let ord = match (left, right) {
            (Some(Ok(x)), Some(Ok(y))) => x.cmp(y),
            (Some(Ok(_)), None) => Ordering::Greater,
            (None, Some(Ok(_))) => Ordering::Less,
            (Some(Err(x)), Some(Err(y))) => qualifier_rank(x).cmp(&qualifier_rank(y)).then_with(|| x.cmp(y)),
            (Some(Err(x)), None) => qualifier_rank(x).cmp(&0),
            (None, Some(Err(y))) => 0.cmp(&qualifier_rank(y)),
            (Some(Ok(_)), Some(Err(y))) => 0.cmp(&qualifier_rank(y)).then(Ordering::Greater),
            (Some(Err(x)), Some(Ok(_))) => qualifier_rank(x).cmp(&0).then(Ordering::Less),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Highest non-SNAPSHOT release by Maven's dotted-numeric-with-qualifier
/// ordering, falling back to the highest version overall if every version
/// is a snapshot (spec §4.5 Maven notes).
pub fn default_version_id(doc: &MavenDoc) -> Option<String> {
    if let Some(latest) = &doc.latest_version {
        if doc.versions.iter().any(|v| &v.v == latest) {
            return Some(latest.clone());
        }
    }
    let stable = doc
        .versions
        .iter()
        .map(|v| v.v.as_str())
        .filter(|v| !v.to_ascii_uppercase().contains("SNAPSHOT"))
        .max_by(|a, b| compare_maven_versions(a, b));
    stable
        .or_else(|| doc.versions.iter().map(|v| v.v.as_str()).max_by(|a, b| compare_maven_versions(a, b)))
        .map(String::from)
}

pub fn resource_from_doc(doc: &MavenDoc, base_url: &str) -> Result<Resource, AdapterError> {
    let resource_id = encode_resource_id(&doc.group_id, &doc.artifact_id);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;

    let base = EntityBase::new(
        &resourcetype_xid,
        base_url,
        EntityConfig {
            id: resource_id,
            name: Some(format!("{}:{}", doc.group_id, doc.artifact_id)),
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    base = base.with_extra("groupid", json!(doc.group_id));
    base = base.with_extra("artifactid", json!(doc.artifact_id));
    if let Some(license) = &doc.license {
        base = base.with_extra("license", json!(license));
    }

    let versions_xid = Xid::child_literal(&base.xid, "versions");
    Ok(Resource {
        versionsurl: xreg_core::xid::self_url(base_url, &versions_xid),
        versionscount: doc.versions.len() as u64,
        base,
    })
}

pub fn version_from_doc(doc: &MavenDoc, version_id: &str, base_url: &str) -> Result<Version, AdapterError> {
    let gav = doc
        .versions
        .iter()
        .find(|v| v.v == version_id)
        .ok_or_else(|| AdapterError::NotFound(format!("no such version '{version_id}'")))?;

    let resource_id = encode_resource_id(&doc.group_id, &doc.artifact_id);
    let group_xid = Xid::parse(format!("/{GROUP_TYPE}/{GROUP_ID}")).map_err(invalid)?;
    let resourcetype_xid = Xid::child(&group_xid, RESOURCE_TYPE).map_err(invalid)?;
    let resource_xid = Xid::child(&resourcetype_xid, &resource_id).map_err(invalid)?;
    let versions_xid = Xid::child_literal(&resource_xid, "versions");

    let created_at = gav.timestamp.and_then(timestamp_to_datetime);

    let base = EntityBase::new(
        &versions_xid,
        base_url,
        EntityConfig {
            id: version_id.to_string(),
            created_at,
            modified_at: created_at,
            ..Default::default()
        },
    )
    .map_err(invalid)?;

    let mut base = base;
    base = base.with_extra(
        "downloadurl",
        json!(format!(
            "https://repo1.maven.org/maven2/{}/{}/{}/{}-{}.jar",
            doc.group_id.replace('.', "/"),
            doc.artifact_id,
            version_id,
            doc.artifact_id,
            version_id
        )),
    );
    if version_id == doc.latest_version.as_deref().unwrap_or_default() {
        if let Some(license) = &doc.license {
            base = base.with_extra("license", json!(license));
        }
    }

    let isdefault = default_version_id(doc).as_deref() == Some(version_id);
    Ok(Version {
        base,
        versionid: version_id.to_string(),
        isdefault,
    })
}

pub fn list_version_ids_newest_first(doc: &MavenDoc) -> Vec<String> {
    let mut ids: Vec<&str> = doc.versions.iter().map(|v| v.v.as_str()).collect();
    ids.sort_by(|a, b| compare_maven_versions(b, a));
    ids.into_iter().map(String::from).collect()
}

/// Best-effort license extraction from a fetched POM XML document.
/// Malformed or license-free POMs simply yield `None` — the POM fetch is
/// an enrichment, not a requirement (spec §4.5: "extras ... attached to
/// Versions as ordinary attributes").
pub fn extract_license_from_pom(pom_xml: &str) -> Option<String> {
    use quick_xml::events::Event;
    use quick_xml::reader::Reader;

    let mut reader = Reader::from_str(pom_xml);
    reader.config_mut().trim_text(true);
    let mut in_license_name = false;
    let mut depth_stack: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let parent_is_license = depth_stack.last().map(String::as_str) == Some("license");
                if name == "name" && parent_is_license {
                    in_license_name = true;
                }
                depth_stack.push(name);
            }
            Ok(Event::End(_)) => {
                depth_stack.pop();
                in_license_name = false;
            }
            Ok(Event::Text(t)) => {
                if in_license_name {
                    if let Ok(text) = t.unescape() {
                        return Some(text.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

fn invalid(e: InvalidEntity) -> AdapterError {
    AdapterError::InvalidEntity(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_versions_compare_numerically_not_lexically() {
        assert_eq!(compare_maven_versions("1.10.0", "1.9.0"), Ordering::Greater);
    }

    #[test]
    fn snapshot_sorts_below_release() {
        assert_eq!(compare_maven_versions("2.0.0-SNAPSHOT", "2.0.0"), Ordering::Less);
    }

    #[test]
    fn extracts_license_name_from_pom() {
        let pom = r#"<project><licenses><license><name>Apache-2.0</name></license></licenses></project>"#;
        assert_eq!(extract_license_from_pom(pom).as_deref(), Some("Apache-2.0"));
    }

    #[test]
    fn decode_resource_id_splits_group_and_artifact() {
        let id = encode_resource_id("com.fasterxml.jackson.core", "jackson-databind");
        let (g, a) = decode_resource_id(&id).unwrap();
        assert_eq!(g, "com.fasterxml.jackson.core");
        assert_eq!(a, "jackson-databind");
    }
}
