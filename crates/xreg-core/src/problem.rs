//! RFC 9457 problem-details error shape (spec §4.2).
//!
//! This is the only code path that produces non-2xx bodies anywhere in the
//! workspace: adapters and the Bridge both convert their closed error enums
//! into a `ProblemDetails` at the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// The closed set of error kinds from spec §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    UnprocessableEntity,
    TooManyRequests,
    BadGateway,
    ServiceUnavailable,
    InternalError,
}

impl ProblemKind {
    pub fn status(self) -> StatusCode {
        match self {
            ProblemKind::BadRequest => StatusCode::BAD_REQUEST,
            ProblemKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ProblemKind::Forbidden => StatusCode::FORBIDDEN,
            ProblemKind::NotFound => StatusCode::NOT_FOUND,
            ProblemKind::Conflict => StatusCode::CONFLICT,
            ProblemKind::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ProblemKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ProblemKind::BadGateway => StatusCode::BAD_GATEWAY,
            ProblemKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ProblemKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short kind token used to build the `type` URI and used in tests/logs.
    pub fn slug(self) -> &'static str {
        match self {
            ProblemKind::BadRequest => "bad-request",
            ProblemKind::Unauthorized => "unauthorized",
            ProblemKind::Forbidden => "forbidden",
            ProblemKind::NotFound => "not-found",
            ProblemKind::Conflict => "conflict",
            ProblemKind::UnprocessableEntity => "unprocessable-entity",
            ProblemKind::TooManyRequests => "too-many-requests",
            ProblemKind::BadGateway => "bad-gateway",
            ProblemKind::ServiceUnavailable => "service-unavailable",
            ProblemKind::InternalError => "internal-error",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ProblemKind::BadRequest => "Bad Request",
            ProblemKind::Unauthorized => "Unauthorized",
            ProblemKind::Forbidden => "Forbidden",
            ProblemKind::NotFound => "Not Found",
            ProblemKind::Conflict => "Conflict",
            ProblemKind::UnprocessableEntity => "Unprocessable Entity",
            ProblemKind::TooManyRequests => "Too Many Requests",
            ProblemKind::BadGateway => "Bad Gateway",
            ProblemKind::ServiceUnavailable => "Service Unavailable",
            ProblemKind::InternalError => "Internal Server Error",
        }
    }
}

/// The default error-namespace prefix. Configurable per deployment via
/// `ProblemDetails::with_namespace`.
pub const DEFAULT_NAMESPACE: &str = "https://xregistry.dev/errors/";

/// Serialized only — a `ProblemDetails` is always produced locally by
/// [`ProblemDetails::new`], never parsed back out of a response body, so
/// this does not derive `Deserialize`.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip)]
    kind: ProblemKind,
}

impl ProblemDetails {
    pub fn new(kind: ProblemKind, detail: impl Into<String>, instance: impl Into<String>) -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE, kind, detail, instance)
    }

    pub fn with_namespace(
        namespace: &str,
        kind: ProblemKind,
        detail: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        ProblemDetails {
            type_uri: format!("{namespace}{}", kind.slug()),
            title: kind.title().to_string(),
            status: kind.status().as_u16(),
            detail: detail.into(),
            instance: instance.into(),
            data: None,
            kind,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn kind(&self) -> ProblemKind {
        self.kind
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_uri_uses_namespace_and_slug() {
        let p = ProblemDetails::new(ProblemKind::BadRequest, "bad filter", "/packages");
        assert_eq!(p.type_uri, "https://xregistry.dev/errors/bad-request");
        assert_eq!(p.status, 400);
        assert_eq!(p.title, "Bad Request");
    }

    #[test]
    fn s5_problem_details_shape() {
        let p = ProblemDetails::new(
            ProblemKind::BadRequest,
            "unparseable filter expression at offset 0",
            "/noderegistries/npmjs.org/packages",
        );
        assert_eq!(p.status, 400);
        assert_eq!(p.instance, "/noderegistries/npmjs.org/packages");
    }
}
