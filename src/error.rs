//! Gateway error taxonomy and HTTP response mapping.
//!
//! Every failure in the request pipeline is converted into exactly one
//! `GatewayError` variant at the boundary of the component that detects it,
//! then rendered as a structured JSON response. Nothing is retried and no
//! failure is process-fatal.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::registry::StoreError;

/// Unified error type for the gateway request pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or incomplete registration payload.
    #[error("{0}")]
    Validation(String),

    /// No caller identity was presented at the transport boundary.
    #[error("missing caller identity header '{0}'")]
    Unauthenticated(String),

    /// Known caller lacking the `request` scope, unknown caller, or a
    /// resolved target lacking the `receive` scope.
    ///
    /// Unknown callers are deliberately reported here rather than as
    /// `NotFound` so the response does not disclose which caller ids are
    /// registered.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown id on lookup/delete, or no registered id is a prefix of the
    /// requested path.
    #[error("{0}")]
    NotFound(String),

    /// The upstream was unreachable or timed out.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Unexpected store or forwarding failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status code this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable kind for the error body.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Unauthenticated(_) => "unauthenticated",
            GatewayError::Forbidden(_) => "forbidden",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Upstream(_) => "upstream",
            GatewayError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        GatewayError::Internal(format!("service store failure: {err}"))
    }
}

/// JSON body attached to every non-2xx response produced by the gateway
/// itself (upstream responses are relayed verbatim and never take this
/// shape).
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthenticated("x-caller".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::Forbidden("no".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Upstream("refused".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_are_internal() {
        let err: GatewayError = StoreError::Io(std::io::Error::other("disk gone")).into();
        assert!(matches!(err, GatewayError::Internal(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthenticated_message_names_the_header() {
        let err = GatewayError::Unauthenticated("x-meshgate-caller".into());
        assert!(err.to_string().contains("x-meshgate-caller"));
    }
}
