//! The `EcosystemAdapter` trait: the uniform surface every ecosystem crate
//! implements so `xreg_adapter::serve` can mount the HTTP routes, apply the
//! filter/sort/inline/pagination engine, and serve model/capabilities
//! documents without knowing anything ecosystem-specific (spec §4.4, §4.5).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use xreg_core::{Resource, Version};
use xreg_upstream::NameIndex;

use crate::error::AdapterError;

/// Everything an ecosystem crate must supply. `xreg_adapter::serve` is
/// generic over this trait; every ecosystem binary is a thin wiring layer
/// that implements it and hands the instance to `serve`.
#[async_trait]
pub trait EcosystemAdapter: Send + Sync + 'static {
    /// The plural group-type this adapter mounts, e.g. `noderegistries`.
    fn group_type(&self) -> &'static str;
    /// The single well-known group id, e.g. `npmjs.org`.
    fn group_id(&self) -> &'static str;
    /// The resource-type nested under the group, e.g. `packages`.
    fn resource_type(&self) -> &'static str;
    /// A short human name for the group (used in the Group entity's `name`).
    fn group_name(&self) -> &'static str {
        self.group_id()
    }

    /// The live, atomically-swappable name index backing this adapter's
    /// mandatory name constraint (spec §4.3, §4.8).
    fn name_index(&self) -> Arc<NameIndex>;

    /// Whether collection endpoints on this adapter require at least one
    /// `filter` branch to constrain `name` (true for every adapter backed
    /// by a large name index, spec §4.3).
    fn requires_name_constraint(&self) -> bool {
        true
    }

    /// Adapter-specific pagination ceiling (spec §9 Open Questions default
    /// of 100, lowerable per adapter).
    fn max_limit(&self) -> u64 {
        100
    }

    /// Whether the resources collection endpoint is disabled entirely (spec
    /// §9 Open Question: the OCI adapter's `catalog` endpoint may be turned
    /// off when the upstream registry forbids bulk listing). When true,
    /// `GET /<grouptype>/<groupid>/<resourcetype>` returns `not-found`
    /// instead of evaluating the name index. Default: enabled.
    fn catalog_disabled(&self) -> bool {
        false
    }

    /// Map one resource id to its default-version Resource payload.
    async fn fetch_resource(
        &self,
        resource_id: &str,
        base_url: &str,
    ) -> Result<Resource, AdapterError>;

    /// Map one `(resource_id, version_id)` pair to a Version payload.
    async fn fetch_version(
        &self,
        resource_id: &str,
        version_id: &str,
        base_url: &str,
    ) -> Result<Version, AdapterError>;

    /// List every Version for a resource, in adapter-defined order (the
    /// versions collection endpoint applies filter/sort/pagination on top).
    async fn list_versions(
        &self,
        resource_id: &str,
        base_url: &str,
    ) -> Result<Vec<Version>, AdapterError>;

    /// The `defaultversionid` this resource's Meta entity should report.
    async fn default_version_id(&self, resource_id: &str) -> Result<Option<String>, AdapterError>;

    /// Ecosystem-specific additions to the merged `/model` document, nested
    /// under this adapter's group-type (license/extras attribute
    /// declarations, nested resourcetypes, etc). Default: none.
    fn model_extras(&self) -> Value {
        json!({})
    }

    /// Ecosystem-specific additions to `/capabilities` (e.g. adapter-lowered
    /// `pagination.max_limit`). Default: none.
    fn capabilities_extras(&self) -> Value {
        json!({})
    }
}
