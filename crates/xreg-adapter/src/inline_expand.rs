//! Inline expansion (spec §2 component #2, §4.3 "Inline"): given an entity
//! and the parsed `inline` flag, attaches the requested nested
//! collections/resources to the response body.
//!
//! Expansion reuses the same two-phase name resolution and default
//! pagination as a direct collection fetch, so it can never trigger an
//! unbounded fetch: `?inline=*` on a group with a 300,000-name index still
//! only fetches [`DEFAULT_INLINE_LIMIT`] resources, exactly as a bare
//! `GET .../packages` would without a `limit` override.

use serde_json::{json, Value};
use xreg_core::{apply_collection, CollectionOptions, CollectionRequest, Group, Inline, Resource};

use crate::error::AdapterError;
use crate::name_phase::{self, NamePhase};
use crate::routes::AdapterState;

/// Matches spec §9 Open Questions' default `limit`; nested fetches are
/// capped here rather than at the adapter's own (possibly higher) ceiling
/// so inlining stays cheap regardless of adapter configuration.
const DEFAULT_INLINE_LIMIT: u64 = 50;

/// Expand `group`'s resourcetype map when `inline` selects it (spec §4.4:
/// `GET /<grouptype>/<groupid>` "supports inline").
pub async fn expand_group(
    state: &AdapterState,
    base: &str,
    inline: &Inline,
    group: &mut Group,
) -> Result<(), AdapterError> {
    let resourcetype = state.adapter.resource_type();
    if !inline.wants(resourcetype) {
        return Ok(());
    }
    let instance = format!("{}/{resourcetype}", group.base.xid.as_str());
    let body = fetch_resources_page(state, base, &instance, inline).await?;
    group.resourcetype_links.insert(resourcetype.to_string(), body);
    Ok(())
}

/// Expand a resource's `versions` map and/or `meta` entity when `inline`
/// selects them (spec §8 "Inline round-trip", "Meta round-trip").
pub async fn expand_resource(
    state: &AdapterState,
    base: &str,
    resource_id: &str,
    inline: &Inline,
    resource: &mut Resource,
) -> Result<(), AdapterError> {
    if inline.wants("versions") {
        let versions = state.adapter.list_versions(resource_id, base).await?;
        let req = CollectionRequest {
            limit: Some(DEFAULT_INLINE_LIMIT),
            instance: format!("{}/versions", resource.base.xid.as_str()),
            ..Default::default()
        };
        let opts = CollectionOptions {
            max_limit: state.adapter.max_limit().min(DEFAULT_INLINE_LIMIT),
            requires_name_constraint: false,
        };
        let result = apply_collection(versions, &req, &opts)
            .map_err(|problem| AdapterError::BadRequest(problem.detail))?;
        resource.base.extras.insert(
            "versions".to_string(),
            json!({ "page": result.page, "total": result.total }),
        );
    }

    if inline.wants("meta") {
        let default_version_id = state.adapter.default_version_id(resource_id).await?;
        let default_version = match &default_version_id {
            Some(vid) => {
                let v = state.adapter.fetch_version(resource_id, vid, base).await?;
                Some((v.versionid.clone(), v.base.self_url.clone()))
            }
            None => None,
        };
        let meta = xreg_core::Meta::for_resource(
            &resource.base.xid,
            base,
            resource.base.epoch,
            resource.base.createdat,
            resource.base.modifiedat,
            default_version.as_ref().map(|(id, url)| (id.as_str(), url.as_str())),
        );
        resource
            .base
            .extras
            .insert("meta".to_string(), serde_json::to_value(meta).unwrap_or(Value::Null));
    }

    Ok(())
}

/// Fetch a name-indexed resources page the same way `resources_collection`
/// does, capped to [`DEFAULT_INLINE_LIMIT`] regardless of what the caller's
/// own `limit` was (an inlined child collection's pagination is independent
/// of the parent request's).
async fn fetch_resources_page(
    state: &AdapterState,
    base: &str,
    instance: &str,
    inline: &Inline,
) -> Result<Value, AdapterError> {
    if state.adapter.catalog_disabled() {
        return Ok(json!({ "page": [], "total": 0 }));
    }

    let index = state.adapter.name_index();
    let names = match name_phase::resolve(&[], &index, false) {
        NamePhase::MissingNameConstraint(_) => Vec::new(),
        NamePhase::Candidates(names) => names,
    };

    let mut resources = Vec::with_capacity(names.len().min(DEFAULT_INLINE_LIMIT as usize));
    for name in names.into_iter().take(DEFAULT_INLINE_LIMIT as usize) {
        match state.adapter.fetch_resource(&name, base).await {
            Ok(mut r) => {
                if inline.depth > 1 {
                    expand_resource(state, base, &name, &nested_inline(inline), &mut r).await?;
                }
                resources.push(r);
            }
            Err(AdapterError::NotFound(_)) => continue,
            Err(other) => return Err(other),
        }
    }

    let req = CollectionRequest {
        limit: Some(DEFAULT_INLINE_LIMIT),
        instance: instance.to_string(),
        ..Default::default()
    };
    let opts = CollectionOptions {
        max_limit: state.adapter.max_limit().min(DEFAULT_INLINE_LIMIT),
        requires_name_constraint: false,
    };
    let result = apply_collection(resources, &req, &opts)
        .map_err(|problem| AdapterError::BadRequest(problem.detail))?;
    Ok(json!({ "page": result.page, "total": result.total }))
}

/// One level down from `inline`, carrying the same selection forward but
/// decrementing depth so a deeply-nested `inline=*,3` terminates.
fn nested_inline(inline: &Inline) -> Inline {
    let mut next = inline.clone();
    next.depth = next.depth.saturating_sub(1);
    next
}
