//! Request forwarding (spec §4.9.5): verbatim proxy of a request to the
//! adapter that owns its group-type, with header rewrites — the client's
//! own bearer token is never forwarded; the Bridge substitutes its own
//! per-adapter key.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::routing::AdapterRoute;

/// Headers stripped from the inbound request before forwarding: hop-by-hop
/// headers and the client's own auth, which is replaced by the adapter's
/// configured key (or omitted).
const STRIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "authorization",
    "x-api-key",
    "connection",
    "content-length",
    "transfer-encoding",
];

pub async fn forward(
    client: &reqwest::Client,
    route: &AdapterRoute,
    method: Method,
    path_and_query: &str,
    inbound_headers: &HeaderMap,
    base_url_for_client: &str,
    body: axum::body::Bytes,
) -> Response {
    let target = format!("{}{}", route.url.trim_end_matches('/'), path_and_query);

    let mut outbound = HeaderMap::new();
    for (name, value) in inbound_headers {
        if !STRIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
            outbound.insert(name.clone(), value.clone());
        }
    }
    if let Ok(value) = HeaderValue::from_str(base_url_for_client) {
        outbound.insert(HeaderName::from_static("x-base-url"), value);
    }

    let mut request = client
        .request(method, &target)
        .timeout(route.timeout)
        .headers(outbound)
        .body(body);
    if let Some(key) = &route.api_key {
        request = request.bearer_auth(key);
    }

    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(url = %target, error = %e, "forwarded request failed");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("upstream adapter unreachable: {e}"),
            )
                .into_response();
        }
    };

    let status = response.status();
    let mut headers = HeaderMap::new();
    for (name, value) in response.headers() {
        if name.as_str() == "content-length" || name.as_str() == "transfer-encoding" {
            continue;
        }
        headers.insert(name.clone(), value.clone());
    }
    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            warn!(url = %target, error = %e, "failed reading forwarded response body");
            return (StatusCode::BAD_GATEWAY, format!("upstream response read failed: {e}")).into_response();
        }
    };

    let mut out = Response::builder().status(status);
    if let Some(h) = out.headers_mut() {
        *h = headers;
    }
    out.body(Body::from(bytes)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to build forwarded response").into_response()
    })
}
