//! Shared entity shape used by Registry, Group, Resource, Version and Meta
//! (spec §3, §4.1).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::xid::{self_url, InvalidEntity, Xid};

/// Arbitrary key/value labels attached to an entity. Serialized only when
/// non-empty.
pub type Labels = BTreeMap<String, String>;

/// The kind of entity an xid/cache-key refers to; used to keep the
/// `(adapter, entity-kind, entity-key)` cache key of §4.6 a real typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Registry,
    Group,
    Resource,
    Version,
    Meta,
}

/// Configuration record accepted by every entity constructor (spec §4.1).
/// `request` is omitted here; callers that need request-derived base URLs
/// resolve `base_url` themselves (see `xreg-adapter::middleware`) before
/// calling the constructor, since this crate has no HTTP dependency on
/// axum's request type.
#[derive(Debug, Clone, Default)]
pub struct EntityConfig {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub labels: Labels,
    pub documentation: Option<String>,
    pub epoch: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Common fields shared by every xRegistry entity kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityBase {
    #[serde(rename = "xid")]
    pub xid: Xid,
    #[serde(rename = "self")]
    pub self_url: String,
    pub epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    pub createdat: DateTime<Utc>,
    pub modifiedat: DateTime<Utc>,
    /// Ecosystem-specific extras projected onto xRegistry names, e.g.
    /// license, authors, homepage, download URL, dependency lists.
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl EntityBase {
    /// Construct a base entity under `parent_xid`, appending `config.id` as
    /// the new path segment. Fails with `InvalidEntity` per spec §4.1 when
    /// `id` contains disallowed characters.
    pub fn new(
        parent_xid: &Xid,
        base_url: &str,
        config: EntityConfig,
    ) -> Result<Self, InvalidEntity> {
        let xid = Xid::child(parent_xid, &config.id)?;
        let now = Utc::now();
        let created_at = config.created_at.unwrap_or(now);
        let modified_at = config.modified_at.unwrap_or(created_at);
        Ok(EntityBase {
            self_url: self_url(base_url, &xid),
            xid,
            epoch: config.epoch.unwrap_or(1),
            name: config.name,
            description: config.description,
            labels: config.labels,
            documentation: config.documentation,
            createdat: created_at,
            modifiedat: modified_at,
            extras: BTreeMap::new(),
        })
    }

    /// Construct the singleton registry root entity (xid `/`).
    pub fn new_root(base_url: &str, config: EntityConfig) -> Self {
        let now = Utc::now();
        let created_at = config.created_at.unwrap_or(now);
        let modified_at = config.modified_at.unwrap_or(created_at);
        EntityBase {
            xid: Xid::root(),
            self_url: self_url(base_url, &Xid::root()),
            epoch: config.epoch.unwrap_or(1),
            name: config.name,
            description: config.description,
            labels: config.labels,
            documentation: config.documentation,
            createdat: created_at,
            modifiedat: modified_at,
            extras: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Invariant check used by tests and by adapters validating upstream
    /// responses translated at the Bridge (spec §8 invariant 2).
    pub fn timestamps_ordered(&self) -> bool {
        self.createdat <= self.modifiedat
    }
}

/// A Version: everything a Resource has, plus a `versionid` unique within
/// the Resource and a resource-scoped `isdefault` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    #[serde(flatten)]
    pub base: EntityBase,
    pub versionid: String,
    pub isdefault: bool,
}

/// A Resource: a package / image / server. `versionsurl`/`versionscount`
/// point at the (virtual, lazily materialized) versions collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    #[serde(flatten)]
    pub base: EntityBase,
    pub versionsurl: String,
    pub versionscount: u64,
}

/// Meta entity: sibling of a Resource's default-version payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub xid: Xid,
    #[serde(rename = "self")]
    pub self_url: String,
    pub epoch: u64,
    pub createdat: DateTime<Utc>,
    pub modifiedat: DateTime<Utc>,
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaultversionid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaultversionsticky: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaultversionurl: Option<String>,
}

impl Meta {
    pub fn for_resource(
        resource_xid: &Xid,
        base_url: &str,
        epoch: u64,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        default_version: Option<(&str, &str)>,
    ) -> Self {
        let xid = Xid::child_literal(resource_xid, "meta");
        Meta {
            self_url: self_url(base_url, &xid),
            xid,
            epoch,
            createdat: created_at,
            modifiedat: modified_at,
            readonly: true,
            defaultversionid: default_version.map(|(id, _)| id.to_string()),
            defaultversionsticky: default_version.as_ref().map(|_| false),
            defaultversionurl: default_version.map(|(_, url)| url.to_string()),
        }
    }
}

/// A Group (e.g. `noderegistries/npmjs.org`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(flatten)]
    pub resourcetype_links: BTreeMap<String, Value>,
}

/// The singleton Registry entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    #[serde(flatten)]
    pub base: EntityBase,
    pub registryid: String,
    pub specversion: String,
    #[serde(flatten)]
    pub grouptype_links: BTreeMap<String, Value>,
}

pub const SPEC_VERSION: &str = "1.0-rc2";

impl crate::attr::Filterable for Resource {
    fn attr(&self, path: &str) -> Option<crate::attr::AttrValue> {
        let value = serde_json::to_value(self).ok()?;
        crate::attr::resolve_json_path(&value, path).map(crate::attr::AttrValue::from_json)
    }
}

impl crate::attr::Sortable for Resource {
    fn xid(&self) -> &Xid {
        &self.base.xid
    }
}

impl crate::attr::Filterable for Version {
    fn attr(&self, path: &str) -> Option<crate::attr::AttrValue> {
        let value = serde_json::to_value(self).ok()?;
        crate::attr::resolve_json_path(&value, path).map(crate::attr::AttrValue::from_json)
    }
}

impl crate::attr::Sortable for Version {
    fn xid(&self) -> &Xid {
        &self.base.xid
    }
}

impl crate::attr::Filterable for Group {
    fn attr(&self, path: &str) -> Option<crate::attr::AttrValue> {
        let value = serde_json::to_value(self).ok()?;
        crate::attr::resolve_json_path(&value, path).map(crate::attr::AttrValue::from_json)
    }
}

impl crate::attr::Sortable for Group {
    fn xid(&self) -> &Xid {
        &self.base.xid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_base_timestamps_default_ordered() {
        let base = EntityBase::new(
            &Xid::root(),
            "https://ex.com",
            EntityConfig {
                id: "express".into(),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(base.timestamps_ordered());
        assert_eq!(base.epoch, 1);
        assert_eq!(base.xid.as_str(), "/express");
        assert_eq!(base.self_url, "https://ex.com/express");
    }

    #[test]
    fn invalid_id_rejected() {
        let err = EntityBase::new(
            &Xid::root(),
            "https://ex.com",
            EntityConfig {
                id: "bad id".into(),
                ..Default::default()
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn resource_attr_resolves_extras_and_base_fields() {
        use crate::attr::Filterable;
        let base = EntityBase::new(
            &Xid::root(),
            "https://ex.com",
            EntityConfig {
                id: "express".into(),
                name: Some("express".into()),
                ..Default::default()
            },
        )
        .unwrap()
        .with_extra("license", "MIT");
        let resource = Resource {
            base,
            versionsurl: "https://ex.com/express/versions".into(),
            versionscount: 3,
        };
        assert_eq!(
            resource.attr("name").unwrap().as_display_string(),
            "express"
        );
        assert_eq!(
            resource.attr("license").unwrap().as_display_string(),
            "MIT"
        );
        assert!(resource.attr("nope").is_none());
    }

    #[test]
    fn meta_xid_is_resource_xid_plus_meta() {
        let resource_xid = Xid::parse("/noderegistries/npmjs.org/packages/express").unwrap();
        let meta = Meta::for_resource(
            &resource_xid,
            "https://ex.com",
            1,
            Utc::now(),
            Utc::now(),
            Some(("4.18.2", "https://ex.com/.../versions/4.18.2")),
        );
        assert_eq!(
            meta.xid.as_str(),
            "/noderegistries/npmjs.org/packages/express/meta"
        );
        assert_eq!(meta.defaultversionid.as_deref(), Some("4.18.2"));
    }
}
