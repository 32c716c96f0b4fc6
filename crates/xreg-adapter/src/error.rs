//! The closed adapter-layer error sum, converted to RFC 9457 problem
//! details at the HTTP boundary — the only code path in an adapter that
//! produces a non-2xx body (spec §4.2, §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use xreg_core::{ProblemDetails, ProblemKind};
use xreg_upstream::UpstreamError;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream unreachable: {0}")]
    ServiceUnavailable(String),
    #[error("upstream returned an unexpected shape: {0}")]
    BadGateway(String),
    #[error("invalid entity: {0}")]
    InvalidEntity(#[from] xreg_core::InvalidEntity),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AdapterError {
    pub fn from_upstream(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Http { status: 404, .. } => {
                AdapterError::NotFound("upstream reported 404".to_string())
            }
            UpstreamError::Timeout(_) | UpstreamError::Network(_) | UpstreamError::QueueOverflow => {
                AdapterError::ServiceUnavailable(err.to_string())
            }
            UpstreamError::TooLarge(_) | UpstreamError::UnexpectedShape(_) => {
                AdapterError::BadGateway(err.to_string())
            }
            UpstreamError::Http { status, body } => {
                AdapterError::BadGateway(format!("upstream HTTP {status}: {body}"))
            }
        }
    }

    fn kind(&self) -> ProblemKind {
        match self {
            AdapterError::BadRequest(_) => ProblemKind::BadRequest,
            AdapterError::Unauthorized => ProblemKind::Unauthorized,
            AdapterError::NotFound(_) => ProblemKind::NotFound,
            AdapterError::ServiceUnavailable(_) => ProblemKind::ServiceUnavailable,
            AdapterError::BadGateway(_) => ProblemKind::BadGateway,
            AdapterError::InvalidEntity(_) => ProblemKind::BadRequest,
            AdapterError::Internal(_) => ProblemKind::InternalError,
        }
    }

    pub fn into_problem(self, instance: &str) -> ProblemDetails {
        let kind = self.kind();
        ProblemDetails::new(kind, self.to_string(), instance)
    }
}

/// Wraps an `AdapterError` together with the request path it occurred on,
/// so handlers can return `Result<T, AdapterErrorResponse>` directly and
/// get a correctly-populated `instance` field for free.
pub struct AdapterErrorResponse {
    pub error: AdapterError,
    pub instance: String,
}

impl IntoResponse for AdapterErrorResponse {
    fn into_response(self) -> Response {
        self.error.into_problem(&self.instance).into_response()
    }
}

pub fn status_for(error: &AdapterError) -> StatusCode {
    error.kind().status()
}
