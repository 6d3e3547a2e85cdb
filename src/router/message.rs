// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Messages and the router wire format.
//!
//! ## Wire Contract
//!
//! Request ([`RoutedMessage`]):
//!
//! ```json
//! { "route": "permission", "type": "get-permission-origins",
//!   "origin": "chrome-extension://...", "msg": { "permissionType": "basic-access" } }
//! ```
//!
//! Response ([`RouterResponse`]), exactly one of:
//!
//! ```json
//! { "return": <handler result> }
//! { "error": { "message": "...", "kind": "authorization", "code": "permission_rejected" } }
//! ```

use std::any::Any;
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::env::Env;
use super::error::RouterError;
use crate::error::ErrorKind;

/// A typed request that can be routed.
///
/// `ROUTE` selects the handler, `TYPE` is the discriminator within it.
pub trait Message: DeserializeOwned + Send + Sync + fmt::Debug + 'static {
    const ROUTE: &'static str;
    const TYPE: &'static str;

    /// Structural validation, run before any guard.
    fn validate_basic(&self) -> Result<(), RouterError> {
        Ok(())
    }

    /// Whether a sender outside the extension may send this message.
    fn approve_external(&self, _env: &Env) -> bool {
        false
    }
}

type ApproveFn = fn(&(dyn Any + Send + Sync), &Env) -> bool;

fn approve_erased<M: Message>(msg: &(dyn Any + Send + Sync), env: &Env) -> bool {
    msg.downcast_ref::<M>()
        .map(|msg| msg.approve_external(env))
        .unwrap_or(false)
}

/// A decoded, validated message whose concrete type is only known to the
/// handler of its route.
#[derive(Debug)]
pub struct AnyMessage {
    route: &'static str,
    msg_type: &'static str,
    origin: String,
    approve: ApproveFn,
    inner: Box<dyn Any + Send + Sync>,
}

impl AnyMessage {
    /// Wrap a concrete message, as the router does after decoding it.
    pub fn from_message<M: Message>(origin: impl Into<String>, msg: M) -> Self {
        Self {
            route: M::ROUTE,
            msg_type: M::TYPE,
            origin: origin.into(),
            approve: approve_erased::<M>,
            inner: Box::new(msg),
        }
    }

    pub fn route(&self) -> &'static str {
        self.route
    }

    pub fn msg_type(&self) -> &'static str {
        self.msg_type
    }

    /// Origin the requester claims to send from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn approve_external(&self, env: &Env) -> bool {
        (self.approve)(self.inner.as_ref(), env)
    }

    /// Take the concrete message out, or get `self` back on a type mismatch.
    pub fn downcast<M: Message>(self) -> Result<M, Self> {
        let Self {
            route,
            msg_type,
            origin,
            approve,
            inner,
        } = self;
        match inner.downcast::<M>() {
            Ok(msg) => Ok(*msg),
            Err(inner) => Err(Self {
                route,
                msg_type,
                origin,
                approve,
                inner,
            }),
        }
    }
}

/// Routed request as it arrives from an external context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoutedMessage {
    pub route: String,
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Origin the requester claims. Checked against the sender by a guard.
    pub origin: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub msg: Value,
}

impl RoutedMessage {
    /// Build the wire form of a typed message.
    pub fn new<M: Message + Serialize>(origin: impl Into<String>, msg: &M) -> Result<Self, RouterError> {
        Ok(Self {
            route: M::ROUTE.to_string(),
            msg_type: M::TYPE.to_string(),
            origin: origin.into(),
            msg: serde_json::to_value(msg).map_err(|e| RouterError::InvalidMessage(e.to_string()))?,
        })
    }
}

/// Failure half of the wire response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WireError {
    pub message: String,
    pub kind: ErrorKind,
    pub code: String,
}

/// Tagged result returned to the external context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RouterResponse {
    #[serde(rename = "return", default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl RouterResponse {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: &RouterError) -> Self {
        Self {
            result: None,
            error: Some(WireError {
                message: error.to_string(),
                kind: error.kind(),
                code: error.error_code().to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
