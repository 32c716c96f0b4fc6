//! Bridge HTTP handlers (spec §4.9.5): composite `/`, `/model`,
//! `/capabilities`, `/health`, and the catch-all forwarder.

use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use xreg_adapter::middleware::{check_api_key, resolve_base_url};
use xreg_core::{EntityBase, EntityConfig, Registry, SPEC_VERSION};

use crate::error::{BridgeError, BridgeErrorResponse};
use crate::health;
use crate::model::MergedModel;
use crate::routing::RoutingTable;

#[derive(Clone)]
pub struct BridgeState {
    pub composite: Arc<MergedModel>,
    pub routes: Arc<RoutingTable>,
    pub client: reqwest::Client,
    pub base_url_fallback: String,
    pub api_key: Option<String>,
}

fn require_auth(state: &BridgeState, headers: &HeaderMap, instance: &str) -> Result<(), BridgeErrorResponse> {
    if check_api_key(headers, state.api_key.as_deref()) {
        Ok(())
    } else {
        Err(BridgeErrorResponse {
            error: BridgeError::Unauthorized,
            instance: instance.to_string(),
        })
    }
}

/// `GET /` — the composite registry entity (spec §8 scenario S1).
pub async fn root(
    State(state): State<BridgeState>,
    headers: HeaderMap,
) -> Result<Json<Registry>, BridgeErrorResponse> {
    require_auth(&state, &headers, "/")?;
    let base = resolve_base_url(&headers, &state.base_url_fallback);
    let base_entity = EntityBase::new_root(&base, EntityConfig::default());
    let mut links = std::collections::BTreeMap::new();
    for (group_type, _route) in state.routes.routes() {
        links.insert(format!("{group_type}url"), json!(format!("{base}/{group_type}")));
        links.insert(format!("{group_type}count"), json!(1));
    }
    Ok(Json(Registry {
        base: base_entity,
        registryid: "bridge".to_string(),
        specversion: SPEC_VERSION.to_string(),
        grouptype_links: links,
    }))
}

/// `GET /model` — the composite model document (union of every adapter's
/// declared group-type).
pub async fn model(State(state): State<BridgeState>) -> Json<Value> {
    Json(state.composite.model.clone())
}

/// `GET /capabilities` — the composite capabilities document.
pub async fn capabilities(State(state): State<BridgeState>) -> Json<Value> {
    Json(state.composite.capabilities.clone())
}

/// `GET /health` — 200 iff every routed adapter's health probe succeeds,
/// else 503 enumerating the failures (spec §4.9.6).
pub async fn health(State(state): State<BridgeState>) -> Response {
    let report = health::probe_all(&state.client, &state.routes).await;
    if report.is_healthy() {
        (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
    } else {
        let failures: Vec<Value> = report
            .failures
            .iter()
            .map(|f| json!({"group_type": f.group_type, "url": f.url, "reason": f.reason}))
            .collect();
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "degraded", "failures": failures})),
        )
            .into_response()
    }
}

/// Catch-all forwarder: routes any other path by its first segment
/// (group-type) to the owning adapter, verbatim, with header rewrites
/// (spec §4.9.5).
pub async fn forward(
    State(state): State<BridgeState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let path = uri.path().to_string();
    if let Err(resp) = require_auth(&state, &headers, &path) {
        return resp.into_response();
    }

    let group_type = path.trim_start_matches('/').split('/').next().unwrap_or("");
    let Some(route) = state.routes.resolve(group_type) else {
        return BridgeErrorResponse {
            error: BridgeError::UnknownGroupType(group_type.to_string()),
            instance: path,
        }
        .into_response();
    };

    let base = resolve_base_url(&headers, &state.base_url_fallback);
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    crate::forward::forward(&state.client, route, method, &path_and_query, &headers, &base, body).await
}
