// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Permissions
//!
//! Which origins hold which permission type. Granting happens through
//! approval flows outside this crate; the router exposes read and revoke.

pub mod error;
pub mod handler;
pub mod messages;
pub mod service;

use std::sync::Arc;

pub use error::PermissionError;
pub use handler::{PermissionHandler, PermissionMessage};
pub use messages::{GetPermissionOriginsMsg, RemovePermissionOriginMsg, ROUTE};
pub use service::PermissionService;

use crate::router::{Router, RouterError};

/// Register the permission messages and handler on `router`.
pub fn init(router: &mut Router, service: Arc<PermissionService>) -> Result<(), RouterError> {
    router.register_message::<GetPermissionOriginsMsg>()?;
    router.register_message::<RemovePermissionOriginMsg>()?;
    router.add_handler(ROUTE, Arc::new(PermissionHandler::new(service)))
}
