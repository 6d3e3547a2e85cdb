// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName},
    Json,
};

use crate::{
    error::ApiError,
    router::{RawContext, RoutedMessage, RouterResponse},
    state::AppState,
};

/// Extension id of the sending context.
pub const SENDER_ID_HEADER: HeaderName = HeaderName::from_static("x-sender-id");
/// Full URL of the sending page.
pub const SENDER_URL_HEADER: HeaderName = HeaderName::from_static("x-sender-url");

fn header(headers: &HeaderMap, name: &HeaderName) -> Result<String, ApiError> {
    let value = headers
        .get(name)
        .ok_or_else(|| ApiError::bad_request(format!("Missing {name} header")))?;
    value
        .to_str()
        .map(str::to_string)
        .map_err(|_| ApiError::bad_request(format!("Invalid {name} header")))
}

/// Route one message through the guard pipeline.
///
/// Router outcomes, failures included, are returned with status 200 as a
/// tagged `{"return": ...}` / `{"error": ...}` body.
#[utoipa::path(
    post,
    path = "/v1/message",
    request_body = RoutedMessage,
    tag = "Router",
    params(
        ("X-Sender-Id" = String, Header, description = "Extension id of the sender"),
        ("X-Sender-Url" = String, Header, description = "URL of the sending page")
    ),
    responses(
        (status = 200, description = "Router outcome", body = RouterResponse),
        (status = 400, description = "Missing or invalid sender headers"),
        (status = 401, description = "Missing or wrong bridge token")
    )
)]
pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(routed): Json<RoutedMessage>,
) -> Result<Json<RouterResponse>, ApiError> {
    let ctx = RawContext::new(
        header(&headers, &SENDER_ID_HEADER)?,
        header(&headers, &SENDER_URL_HEADER)?,
    );
    Ok(Json(state.router.handle(&ctx, routed).await))
}
