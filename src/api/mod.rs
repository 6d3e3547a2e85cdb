// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Loopback HTTP bridge.
//!
//! External contexts (extension pages, content scripts) reach the router
//! through `POST /v1/message`. The sender identity travels in the
//! `X-Sender-Id` / `X-Sender-Url` headers set by the extension transport,
//! and is only read once [`auth::require_bridge_token`] has accepted the
//! bearer token.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::ErrorKind,
    router::{RoutedMessage, RouterResponse, WireError},
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod message;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/message", post(message::post_message))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bridge_token))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        message::post_message,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            RoutedMessage,
            RouterResponse,
            WireError,
            ErrorKind,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Router", description = "Message routing for external contexts"),
        (name = "Health", description = "Liveness and readiness")
    )
)]
struct ApiDoc;
