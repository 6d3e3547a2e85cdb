// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Route handlers.

use async_trait::async_trait;
use serde_json::Value;

use super::env::Env;
use super::error::RouterError;
use super::message::AnyMessage;

/// One dispatch function per route.
///
/// Implementations convert the [`AnyMessage`] into a closed enum of the
/// route's message kinds and `match` on it, rejecting anything else with
/// [`RouterError::UnknownMessageType`].
#[async_trait]
pub trait Handler: Send + Sync {
    /// Every message type this handler understands. Checked against the
    /// registered messages of the route when either side is registered.
    fn message_types(&self) -> &'static [&'static str];

    async fn handle(&self, env: &Env, msg: AnyMessage) -> Result<Value, RouterError>;
}

/// Serialize a handler result into the wire value.
pub fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RouterError> {
    serde_json::to_value(value).map_err(|e| RouterError::Handler {
        kind: crate::error::ErrorKind::Internal,
        code: "serialization_error",
        message: e.to_string(),
    })
}
