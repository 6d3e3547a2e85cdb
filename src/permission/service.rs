// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission table: `permission type -> [origin]`, persisted as one
//! document under `permission/permission-origins`.
//!
//! Every mutation holds the write lock across read, modify and persist, and
//! the in-memory table is only replaced once the new one has been written.
//! A failed write leaves both copies as they were.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::error::PermissionError;
use crate::storage::PrefixedStore;

const TABLE_KEY: &str = "permission-origins";

type PermissionTable = BTreeMap<String, Vec<String>>;

pub struct PermissionService {
    store: PrefixedStore,
    table: RwLock<PermissionTable>,
}

impl PermissionService {
    /// Load the persisted table, starting empty when nothing was stored.
    pub async fn init(store: PrefixedStore) -> Result<Self, PermissionError> {
        let table: PermissionTable = store.get(TABLE_KEY).await?.unwrap_or_default();
        debug!(permission_types = table.len(), "Loaded permission table");
        Ok(Self {
            store,
            table: RwLock::new(table),
        })
    }

    /// Origins holding `permission_type`, in grant order. Empty if none.
    pub async fn get_permission_origins(&self, permission_type: &str) -> Vec<String> {
        self.table
            .read()
            .await
            .get(permission_type)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn has_permission(&self, permission_type: &str, origin: &str) -> bool {
        self.table
            .read()
            .await
            .get(permission_type)
            .is_some_and(|origins| origins.iter().any(|o| o == origin))
    }

    /// Grant `permission_type` to `origins`. Already granted origins are kept
    /// in place.
    pub async fn add_permission(&self, permission_type: &str, origins: &[String]) -> Result<(), PermissionError> {
        validate(permission_type, origins)?;

        let mut table = self.table.write().await;
        let mut next = table.clone();
        let entry = next.entry(permission_type.to_string()).or_default();
        for origin in origins {
            if !entry.contains(origin) {
                entry.push(origin.clone());
            }
        }

        if next == *table {
            return Ok(());
        }
        self.store.set(TABLE_KEY, &next).await?;
        *table = next;

        info!(permission_type, origins = ?origins, "Permission granted");
        Ok(())
    }

    /// Revoke `permission_type` from `origins`. Origins that never held it are
    /// ignored, so removing twice is the same as removing once.
    pub async fn remove_permission(&self, permission_type: &str, origins: &[String]) -> Result<(), PermissionError> {
        validate(permission_type, origins)?;

        let mut table = self.table.write().await;
        let mut next = table.clone();
        if let Some(entry) = next.get_mut(permission_type) {
            entry.retain(|o| !origins.contains(o));
            if entry.is_empty() {
                next.remove(permission_type);
            }
        }

        if next == *table {
            return Ok(());
        }
        self.store.set(TABLE_KEY, &next).await?;
        *table = next;

        info!(permission_type, origins = ?origins, "Permission removed");
        Ok(())
    }
}

fn validate(permission_type: &str, origins: &[String]) -> Result<(), PermissionError> {
    if permission_type.is_empty() {
        return Err(PermissionError::EmptyPermissionType);
    }
    if origins.iter().any(String::is_empty) {
        return Err(PermissionError::EmptyOrigin);
    }
    Ok(())
}
