// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-call caller environment.
//!
//! The transport hands the router a [`RawContext`] describing who sent the
//! message. An [`EnvProducer`] turns it into the [`Env`] guards and handlers
//! see. Nothing downstream reads the raw context.

use url::Url;
use uuid::Uuid;

use super::error::RouterError;

/// Sender information exactly as the transport reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContext {
    /// Extension id of the sending context.
    pub sender_id: String,
    /// Full URL of the sending page or extension page.
    pub sender_url: String,
}

impl RawContext {
    pub fn new(sender_id: impl Into<String>, sender_url: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender_url: sender_url.into(),
        }
    }
}

/// Caller identity for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    pub request_id: Uuid,
    pub sender_id: String,
    /// `scheme://host[:port]` of the sender URL.
    pub origin: String,
    /// Sender is one of the extension's own pages.
    pub is_internal: bool,
}

/// Builds an [`Env`] from the transport context.
pub trait EnvProducer: Send + Sync {
    fn produce_env(&self, ctx: &RawContext) -> Result<Env, RouterError>;
}

/// Env producer for the browser extension: a sender is internal when it is
/// the extension itself and its URL lives under the extension origin.
#[derive(Debug, Clone)]
pub struct ExtensionEnvProducer {
    extension_id: String,
    extension_origin: String,
}

impl ExtensionEnvProducer {
    pub fn new(extension_id: impl Into<String>, extension_origin: impl Into<String>) -> Self {
        Self {
            extension_id: extension_id.into(),
            extension_origin: extension_origin.into(),
        }
    }
}

impl EnvProducer for ExtensionEnvProducer {
    fn produce_env(&self, ctx: &RawContext) -> Result<Env, RouterError> {
        let origin = origin_of(&ctx.sender_url).ok_or_else(|| {
            RouterError::rejected("env", format!("Invalid sender url: {}", ctx.sender_url))
        })?;

        let is_internal = ctx.sender_id == self.extension_id && origin == self.extension_origin;

        Ok(Env {
            request_id: Uuid::new_v4(),
            sender_id: ctx.sender_id.clone(),
            origin,
            is_internal,
        })
    }
}

/// `scheme://host[:port]` for any URL with a host.
///
/// `Url::origin` is opaque for non-special schemes such as
/// `chrome-extension://`, so the tuple is assembled by hand.
pub fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
