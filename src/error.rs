// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Error Taxonomy
//!
//! Every subsystem error (`CryptoError`, `RouterError`, `QueryError`, ...)
//! classifies itself into one [`ErrorKind`]. Callers branch on the kind, not
//! on the concrete type:
//!
//! | Kind | Meaning | Retry |
//! |------|---------|-------|
//! | `Validation` | malformed message or key store fields | no |
//! | `Integrity` | MAC mismatch on decrypt | no |
//! | `Authorization` | guard rejection | no |
//! | `Precondition` | missing nonce / session / contract address | after state changes |
//! | `Credential` | viewing key missing or wrong | after re-entry |
//! | `Transport` | network failure or cancellation | yes |
//! | `Protocol` | unexpected response shape | no |
//! | `Storage` | persistence failure | no |
//! | `Internal` | bug or invariant violation | no |
//!
//! [`ApiError`] is the JSON error body of the loopback HTTP bridge.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Classification shared by all errors of the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Integrity,
    Authorization,
    Precondition,
    Credential,
    Transport,
    Protocol,
    Storage,
    Internal,
}

impl ErrorKind {
    /// Whether the caller may retry the same call once conditions change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Precondition | ErrorKind::Credential | ErrorKind::Transport
        )
    }

    /// Stable string form, used in wire errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Precondition => "precondition",
            ErrorKind::Credential => "credential",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the HTTP bridge for failures outside the router wire
/// contract (malformed headers, unreadable body).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub kind: ErrorKind,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            kind,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorKind::Authorization, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.kind.as_str(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::Transport.is_retryable());
        assert!(ErrorKind::Credential.is_retryable());
        assert!(ErrorKind::Precondition.is_retryable());
        assert!(!ErrorKind::Integrity.is_retryable());
        assert!(!ErrorKind::Authorization.is_retryable());
        assert!(!ErrorKind::Protocol.is_retryable());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::Authorization).unwrap();
        assert_eq!(json, r#""authorization""#);
        assert_eq!(ErrorKind::Credential.to_string(), "credential");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","error_code":"validation"}"#);
    }
}
