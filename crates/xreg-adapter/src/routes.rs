//! HTTP handlers implementing the adapter contract of spec §4.4: model,
//! capabilities, health, and the group/resource/version collection and
//! entity endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use xreg_core::{
    apply_collection, CollectionOptions, CollectionResult, EntityBase, EntityConfig, Group, Meta,
    ProblemDetails, Registry, Resource, Version, Xid, SPEC_VERSION,
};

use crate::error::{AdapterError, AdapterErrorResponse};
use crate::middleware::{resolve_base_url, CollectionFlags};
use crate::name_phase::NamePhase;
use crate::trait_::EcosystemAdapter;

#[derive(Clone)]
pub struct AdapterState {
    pub adapter: Arc<dyn EcosystemAdapter>,
    pub base_url_fallback: String,
    pub api_key: Option<String>,
}

fn require_auth(state: &AdapterState, headers: &HeaderMap, instance: &str) -> Result<(), AdapterErrorResponse> {
    if crate::middleware::check_api_key(headers, state.api_key.as_deref()) {
        Ok(())
    } else {
        Err(AdapterErrorResponse {
            error: AdapterError::Unauthorized,
            instance: instance.to_string(),
        })
    }
}

fn base_url(state: &AdapterState, headers: &HeaderMap) -> String {
    resolve_base_url(headers, &state.base_url_fallback)
}

fn not_found_unless_group(state: &AdapterState, groupid: &str, instance: &str) -> Result<(), AdapterErrorResponse> {
    if groupid == state.adapter.group_id() {
        Ok(())
    } else {
        Err(AdapterErrorResponse {
            error: AdapterError::NotFound(format!("no such group '{groupid}'")),
            instance: instance.to_string(),
        })
    }
}

fn group_entity(state: &AdapterState, base_url: &str) -> Result<Group, AdapterError> {
    let adapter = &state.adapter;
    let group_type_xid = Xid::child(&Xid::root(), adapter.group_type())?;
    let base = EntityBase::new(
        &group_type_xid,
        base_url,
        EntityConfig {
            id: adapter.group_id().to_string(),
            name: Some(adapter.group_name().to_string()),
            ..Default::default()
        },
    )?;
    let resourcetype = adapter.resource_type();
    let mut links = std::collections::BTreeMap::new();
    links.insert(format!("{resourcetype}url"), json!(format!("{}/{resourcetype}", base.self_url)));
    links.insert(format!("{resourcetype}count"), json!(state.adapter.name_index().len()));
    Ok(Group {
        base,
        resourcetype_links: links,
    })
}

/// `GET /` — the adapter's own sub-registry document (spec §4.4).
pub async fn root(
    State(state): State<AdapterState>,
    headers: HeaderMap,
) -> Result<Json<Registry>, AdapterErrorResponse> {
    require_auth(&state, &headers, "/")?;
    let base = base_url(&state, &headers);
    let adapter = &state.adapter;
    let registry_base = EntityBase::new_root(&base, EntityConfig::default());
    let group_type = adapter.group_type();
    let mut links = std::collections::BTreeMap::new();
    links.insert(format!("{group_type}url"), json!(format!("{base}/{group_type}")));
    links.insert(format!("{group_type}count"), json!(1));
    Ok(Json(Registry {
        base: registry_base,
        registryid: group_type.to_string(),
        specversion: SPEC_VERSION.to_string(),
        grouptype_links: links,
    }))
}

/// `GET /model` — this adapter's portion of the merged model document.
pub async fn model(State(state): State<AdapterState>) -> Json<Value> {
    let adapter = &state.adapter;
    Json(json!({
        "groups": {
            adapter.group_type(): {
                "plural": adapter.group_type(),
                "singular": adapter.group_type().trim_end_matches('s'),
                "resources": {
                    adapter.resource_type(): {
                        "plural": adapter.resource_type(),
                        "singular": adapter.resource_type().trim_end_matches('s'),
                        "hasversions": true,
                        "extras": adapter.model_extras(),
                    }
                }
            }
        }
    }))
}

/// `GET /capabilities` — capability flags per spec §4.4.
pub async fn capabilities(State(state): State<AdapterState>) -> Json<Value> {
    let adapter = &state.adapter;
    let group_type = adapter.group_type();
    let resource_type = adapter.resource_type();
    Json(json!({
        "pagination": true,
        "filtering": true,
        "sort": true,
        "inline": true,
        "specversions": [SPEC_VERSION],
        "apis": [
            "/", "/model", "/capabilities", "/health",
            format!("/{group_type}"),
            format!("/{group_type}/:groupid"),
            format!("/{group_type}/:groupid/{resource_type}"),
            format!("/{group_type}/:groupid/{resource_type}/:resourceid"),
            format!("/{group_type}/:groupid/{resource_type}/:resourceid/meta"),
            format!("/{group_type}/:groupid/{resource_type}/:resourceid/versions"),
            format!("/{group_type}/:groupid/{resource_type}/:resourceid/versions/:versionid"),
        ],
        "flags": {
            "max_limit": adapter.max_limit(),
            "requires_name_constraint": adapter.requires_name_constraint(),
        },
        "extras": adapter.capabilities_extras(),
    }))
}

/// `GET /health` — liveness of this adapter process itself; upstream
/// reachability is probed by the Bridge, not self-reported here (§4.9).
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /<grouptype>` — groups collection (cardinality one per adapter).
pub async fn groups_collection(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    flags: CollectionFlags,
) -> Result<Response, AdapterErrorResponse> {
    let path = flags.path.clone();
    require_auth(&state, &headers, &path)?;
    let base = base_url(&state, &headers);
    let group = group_entity(&state, &base).map_err(|error| AdapterErrorResponse { error, instance: path.clone() })?;
    let req = flags.into_collection_request(path.clone());
    let result = apply_collection(vec![group], &req, &CollectionOptions::default())
        .map_err(|problem| problem_response(problem))?;
    Ok(collection_response(result))
}

/// `GET /<grouptype>/<groupid>` — single group. Supports `inline` (spec
/// §4.4) to attach the resourcetype collection to the body.
pub async fn group(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    Path(groupid): Path<String>,
    flags: CollectionFlags,
) -> Result<Json<Group>, AdapterErrorResponse> {
    let instance = format!("/{}/{}", state.adapter.group_type(), groupid);
    require_auth(&state, &headers, &instance)?;
    not_found_unless_group(&state, &groupid, &instance)?;
    let base = base_url(&state, &headers);
    let mut grp = group_entity(&state, &base).map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
    let inline = flags.inline();
    if inline.is_active() {
        crate::inline_expand::expand_group(&state, &base, &inline, &mut grp)
            .await
            .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
    }
    Ok(Json(grp))
}

/// `GET /<grouptype>/<groupid>/<resourcetype>` — resources collection,
/// supporting filter/sort/inline/pagination with the mandatory name
/// constraint of spec §4.3, evaluated in two phases: a name-index phase
/// that never touches upstream, then an attribute phase that fetches only
/// the surviving candidates.
pub async fn resources_collection(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    Path((groupid, _resourcetype)): Path<(String, String)>,
    flags: CollectionFlags,
) -> Result<Response, AdapterErrorResponse> {
    let path = flags.path.clone();
    require_auth(&state, &headers, &path)?;
    not_found_unless_group(&state, &groupid, &path)?;
    if state.adapter.catalog_disabled() {
        return Err(AdapterErrorResponse {
            error: AdapterError::NotFound("catalog listing is disabled for this registry".to_string()),
            instance: path,
        });
    }
    let base = base_url(&state, &headers);
    let index = state.adapter.name_index();
    let opts = CollectionOptions {
        max_limit: state.adapter.max_limit(),
        requires_name_constraint: state.adapter.requires_name_constraint(),
    };
    let req = flags.into_collection_request(path.clone());

    let names = match crate::name_phase::resolve(&req.filters, &index, opts.requires_name_constraint) {
        NamePhase::MissingNameConstraint(notice) => {
            return Ok(collection_response_with_notice(
                CollectionResult::<Resource> {
                    page: Vec::new(),
                    total: 0,
                    link_header: None,
                    notice: None,
                },
                Some(notice),
            ));
        }
        NamePhase::Candidates(names) => names,
    };

    let mut resources = Vec::with_capacity(names.len());
    for name in &names {
        match state.adapter.fetch_resource(name, &base).await {
            Ok(resource) => resources.push(resource),
            Err(AdapterError::NotFound(_)) => continue,
            Err(other) => return Err(AdapterErrorResponse { error: other, instance: path.clone() }),
        }
    }

    let result = apply_collection(resources, &req, &opts).map_err(problem_response)?;
    Ok(collection_response(result))
}

/// `GET /.../<resourceid>` — resource (default-version payload). Supports
/// `inline=versions`/`inline=meta` (spec §4.3, §8 "Inline round-trip" and
/// "Meta round-trip").
pub async fn resource(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    Path((groupid, _resourcetype, resourceid)): Path<(String, String, String)>,
    flags: CollectionFlags,
) -> Result<Json<Resource>, AdapterErrorResponse> {
    let instance = format!(
        "/{}/{}/{}/{}",
        state.adapter.group_type(),
        groupid,
        state.adapter.resource_type(),
        resourceid
    );
    require_auth(&state, &headers, &instance)?;
    not_found_unless_group(&state, &groupid, &instance)?;
    let base = base_url(&state, &headers);
    let mut resource = state
        .adapter
        .fetch_resource(&resourceid, &base)
        .await
        .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
    let inline = flags.inline();
    if inline.is_active() {
        crate::inline_expand::expand_resource(&state, &base, &resourceid, &inline, &mut resource)
            .await
            .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
    }
    Ok(Json(resource))
}

/// `GET /.../<resourceid>/meta`.
pub async fn meta(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    Path((groupid, _resourcetype, resourceid)): Path<(String, String, String)>,
) -> Result<Json<Meta>, AdapterErrorResponse> {
    let instance = format!(
        "/{}/{}/{}/{}/meta",
        state.adapter.group_type(),
        groupid,
        state.adapter.resource_type(),
        resourceid
    );
    require_auth(&state, &headers, &instance)?;
    not_found_unless_group(&state, &groupid, &instance)?;
    let base = base_url(&state, &headers);
    let resource = state
        .adapter
        .fetch_resource(&resourceid, &base)
        .await
        .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
    let default_version_id = state
        .adapter
        .default_version_id(&resourceid)
        .await
        .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;

    let default_version = match &default_version_id {
        Some(vid) => {
            let v = state
                .adapter
                .fetch_version(&resourceid, vid, &base)
                .await
                .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
            Some((v.versionid.clone(), v.base.self_url.clone()))
        }
        None => None,
    };

    Ok(Json(Meta::for_resource(
        &resource.base.xid,
        &base,
        resource.base.epoch,
        resource.base.createdat,
        resource.base.modifiedat,
        default_version.as_ref().map(|(id, url)| (id.as_str(), url.as_str())),
    )))
}

/// `GET /.../<resourceid>/versions` — versions collection. Not
/// name-indexed (per-resource cardinality is small), so the mandatory name
/// constraint does not apply here.
pub async fn versions_collection(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    Path((groupid, _resourcetype, resourceid)): Path<(String, String, String)>,
    flags: CollectionFlags,
) -> Result<Response, AdapterErrorResponse> {
    let path = flags.path.clone();
    require_auth(&state, &headers, &path)?;
    not_found_unless_group(&state, &groupid, &path)?;
    let base = base_url(&state, &headers);
    let versions = state
        .adapter
        .list_versions(&resourceid, &base)
        .await
        .map_err(|error| AdapterErrorResponse { error, instance: path.clone() })?;
    let opts = CollectionOptions {
        max_limit: state.adapter.max_limit(),
        requires_name_constraint: false,
    };
    let req = flags.into_collection_request(path.clone());
    let result = apply_collection(versions, &req, &opts).map_err(problem_response)?;
    Ok(collection_response(result))
}

/// `GET /.../<resourceid>/versions/<versionid>`.
pub async fn version(
    State(state): State<AdapterState>,
    headers: HeaderMap,
    Path((groupid, _resourcetype, resourceid, versionid)): Path<(String, String, String, String)>,
) -> Result<Json<Version>, AdapterErrorResponse> {
    let instance = format!(
        "/{}/{}/{}/{}/versions/{}",
        state.adapter.group_type(),
        groupid,
        state.adapter.resource_type(),
        resourceid,
        versionid
    );
    require_auth(&state, &headers, &instance)?;
    not_found_unless_group(&state, &groupid, &instance)?;
    let base = base_url(&state, &headers);
    let v = state
        .adapter
        .fetch_version(&resourceid, &versionid, &base)
        .await
        .map_err(|error| AdapterErrorResponse { error, instance: instance.clone() })?;
    Ok(Json(v))
}

fn collection_response<T: serde::Serialize>(result: CollectionResult<T>) -> Response {
    collection_response_with_notice(result, None)
}

fn collection_response_with_notice<T: serde::Serialize>(
    result: CollectionResult<T>,
    notice: Option<String>,
) -> Response {
    let body = json!({ "page": result.page, "total": result.total });
    let mut response = (StatusCode::OK, Json(body)).into_response();
    if let Some(link) = &result.link_header {
        if let Ok(value) = axum::http::HeaderValue::from_str(link) {
            response.headers_mut().insert(axum::http::header::LINK, value);
        }
    }
    if let Some(notice) = notice.or(result.notice) {
        if let Ok(value) = axum::http::HeaderValue::from_str(&notice) {
            response.headers_mut().insert("x-xregistry-notice", value);
        }
    }
    response
}

fn problem_response(problem: ProblemDetails) -> AdapterErrorResponse {
    AdapterErrorResponse {
        error: AdapterError::BadRequest(problem.detail.clone()),
        instance: problem.instance.clone(),
    }
}
