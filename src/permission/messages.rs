// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission route messages.

use serde::{Deserialize, Serialize};

use crate::router::{Message, RouterError};

pub const ROUTE: &str = "permission";

/// List the origins holding `permission_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPermissionOriginsMsg {
    pub permission_type: String,
}

impl Message for GetPermissionOriginsMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "get-permission-origins";

    fn validate_basic(&self) -> Result<(), RouterError> {
        if self.permission_type.is_empty() {
            return Err(RouterError::InvalidMessage("Permission type is empty".to_string()));
        }
        Ok(())
    }
}

/// Revoke `permission_type` from a single origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovePermissionOriginMsg {
    pub permission_type: String,
    pub permission_origin: String,
}

impl Message for RemovePermissionOriginMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "remove-permission-origin";

    fn validate_basic(&self) -> Result<(), RouterError> {
        if self.permission_type.is_empty() {
            return Err(RouterError::InvalidMessage("Permission type is empty".to_string()));
        }
        if self.permission_origin.is_empty() {
            return Err(RouterError::InvalidMessage("Origin is empty".to_string()));
        }
        Ok(())
    }
}
