//! The ordered middleware chain of spec §4.10: CORS, request-id assignment,
//! request logging, and the flags parser that populates a per-request
//! `CollectionFlags` value. The central error handler is the `IntoResponse`
//! impl on `AdapterError` (see `error.rs`) rather than a middleware layer.

use std::time::Instant;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use xreg_core::{parse_inline, CollectionRequest, Inline};

/// Base-URL precedence from spec §6: `x-base-url` header, then
/// `x-forwarded-proto`+`x-forwarded-host`, then `Host` + connection scheme.
/// `x-base-url` wins over a disagreeing `x-forwarded-proto` (spec §9 Open
/// Questions default).
pub fn resolve_base_url(headers: &HeaderMap, fallback: &str) -> String {
    if let Some(v) = headers.get("x-base-url").and_then(|v| v.to_str().ok()) {
        return v.trim_end_matches('/').to_string();
    }
    let forwarded_host = headers
        .get("x-forwarded-host")
        .and_then(|v| v.to_str().ok());
    if let Some(host) = forwarded_host {
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("https");
        return format!("{proto}://{host}");
    }
    if let Some(host) = headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok()) {
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        return format!("{proto}://{host}");
    }
    fallback.trim_end_matches('/').to_string()
}

/// Assigns a request id (reusing an inbound `x-request-id` if present) and
/// logs method/path/status/latency, mirroring the teacher's
/// `log_request` middleware generalized to every adapter route.
pub async fn request_id_and_logging(
    req: axum::extract::Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(req).await;

    let elapsed = start.elapsed();
    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = elapsed.as_millis() as u64,
        "handled request"
    );
    if let Ok(value) = axum::http::HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Optional bearer-token gate: when the adapter is configured with an API
/// key, every request must present it in `Authorization: Bearer <key>` or
/// `X-API-Key` (spec §4.9.7, reused here for adapters reachable directly).
pub fn check_api_key(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    let bearer_ok = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| token == expected)
        .unwrap_or(false);
    let api_key_ok = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|token| token == expected)
        .unwrap_or(false);
    bearer_ok || api_key_ok
}

/// Raw xRegistry collection query parameters, deserialized once by axum's
/// `Query` extractor then turned into a `CollectionRequest`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCollectionFlags {
    #[serde(default)]
    pub filter: Vec<String>,
    pub sort: Option<String>,
    pub inline: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub epoch: Option<u64>,
    #[serde(default)]
    pub doc: bool,
    #[serde(default)]
    pub collections: bool,
    pub specversion: Option<String>,
}

/// Extractor that parses every xRegistry query flag in one shot, mirroring
/// the teacher's combined `ListParams`/`PaginationParams`/`SearchParams`
/// extractors (spec §4.10 SUPPLEMENT).
#[derive(Debug, Clone, Default)]
pub struct CollectionFlags {
    pub raw: RawCollectionFlags,
    pub path: String,
}

#[async_trait::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CollectionFlags {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawCollectionFlags>::from_request_parts(parts, state)
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.body_text()))?;
        Ok(CollectionFlags {
            raw,
            path: parts.uri.path().to_string(),
        })
    }
}

impl CollectionFlags {
    /// The parsed `inline` flag (spec §4.3 "Inline"), consumed by the
    /// inline expander rather than by `apply_collection` itself.
    pub fn inline(&self) -> Inline {
        parse_inline(self.raw.inline.as_deref())
    }

    pub fn into_collection_request(self, instance_with_query: String) -> CollectionRequest {
        CollectionRequest {
            filters: self.raw.filter,
            sort: self.raw.sort,
            limit: self.raw.limit,
            offset: self.raw.offset.unwrap_or(0),
            epoch: self.raw.epoch,
            instance: instance_with_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn base_url_prefers_x_base_url() {
        let mut headers = HeaderMap::new();
        headers.insert("x-base-url", HeaderValue::from_static("https://bridge.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert_eq!(
            resolve_base_url(&headers, "http://fallback"),
            "https://bridge.example.com"
        );
    }

    #[test]
    fn base_url_falls_back_to_forwarded_host() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("api.example.com"));
        assert_eq!(
            resolve_base_url(&headers, "http://fallback"),
            "https://api.example.com"
        );
    }

    #[test]
    fn base_url_falls_back_to_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::HOST, HeaderValue::from_static("localhost:8081"));
        assert_eq!(resolve_base_url(&headers, "http://fallback"), "http://localhost:8081");
    }

    #[test]
    fn base_url_falls_back_to_configured_default() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_base_url(&headers, "http://fallback/"), "http://fallback");
    }

    #[test]
    fn api_key_check_accepts_bearer_or_header() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert!(check_api_key(&headers, Some("secret")));

        let mut headers2 = HeaderMap::new();
        headers2.insert("x-api-key", HeaderValue::from_static("secret"));
        assert!(check_api_key(&headers2, Some("secret")));

        assert!(!check_api_key(&HeaderMap::new(), Some("secret")));
        assert!(check_api_key(&HeaderMap::new(), None));
    }
}
