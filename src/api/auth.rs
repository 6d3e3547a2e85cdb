// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bridge authentication.
//!
//! The sender headers on `/v1/message` are only trusted once the caller has
//! shown the bridge token:
//!
//! ```text
//! Authorization: Bearer <BRIDGE_TOKEN>
//! ```
//!
//! Requests without it never reach the router.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{error::ApiError, state::AppState};

fn bearer(request: &Request) -> Result<&str, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid authorization header"))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| ApiError::unauthorized("Expected a bearer token"))
}

/// Reject requests whose bearer token is not the bridge token.
pub async fn require_bridge_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = match bearer(&request) {
        Ok(token) => token,
        Err(err) => return err.into_response(),
    };
    if !bool::from(token.as_bytes().ct_eq(state.bridge_token.as_bytes())) {
        warn!(path = %request.uri().path(), "Rejected request with a wrong bridge token");
        return ApiError::unauthorized("Invalid bridge token").into_response();
    }
    next.run(request).await
}
