// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission service errors.

use crate::error::ErrorKind;
use crate::router::RouterError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("Permission type is empty")]
    EmptyPermissionType,

    #[error("Origin is empty")]
    EmptyOrigin,

    #[error("Failed to persist permissions: {0}")]
    Storage(#[from] StorageError),
}

impl PermissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PermissionError::EmptyPermissionType | PermissionError::EmptyOrigin => ErrorKind::Validation,
            PermissionError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PermissionError::EmptyPermissionType => "empty_permission_type",
            PermissionError::EmptyOrigin => "empty_origin",
            PermissionError::Storage(_) => "storage_error",
        }
    }
}

impl From<PermissionError> for RouterError {
    fn from(err: PermissionError) -> Self {
        RouterError::Handler {
            kind: err.kind(),
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}
