//! The Bridge's closed error sum, converted to RFC 9457 problem details at
//! the HTTP boundary (spec §4.2, §7).

use axum::response::{IntoResponse, Response};
use thiserror::Error;
use xreg_core::{ProblemDetails, ProblemKind};

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("no adapter owns group-type '{0}'")]
    UnknownGroupType(String),
    #[error("upstream adapter unreachable: {0}")]
    ServiceUnavailable(String),
    #[error("upstream adapter returned an unexpected shape: {0}")]
    BadGateway(String),
    #[error("duplicate group-type '{group_type}' declared by {first} and {second}")]
    DuplicateGroupType {
        group_type: String,
        first: String,
        second: String,
    },
}

impl BridgeError {
    pub fn kind(&self) -> ProblemKind {
        match self {
            BridgeError::Unauthorized => ProblemKind::Unauthorized,
            BridgeError::UnknownGroupType(_) => ProblemKind::NotFound,
            BridgeError::ServiceUnavailable(_) => ProblemKind::ServiceUnavailable,
            BridgeError::BadGateway(_) => ProblemKind::BadGateway,
            BridgeError::DuplicateGroupType { .. } => ProblemKind::Conflict,
        }
    }

    pub fn into_problem(self, instance: &str) -> ProblemDetails {
        let kind = self.kind();
        ProblemDetails::new(kind, self.to_string(), instance)
    }
}

/// Wraps a `BridgeError` with the request path that triggered it, so route
/// handlers can return `Result<T, BridgeErrorResponse>` directly.
pub struct BridgeErrorResponse {
    pub error: BridgeError,
    pub instance: String,
}

impl IntoResponse for BridgeErrorResponse {
    fn into_response(self) -> Response {
        self.error.into_problem(&self.instance).into_response()
    }
}
