// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key-value persistence consumed by the services.
//!
//! The core never assumes a concrete backend. Services receive a
//! [`PrefixedStore`] that namespaces their keys (`keyring/...`,
//! `permission/...`) over a shared [`KvStore`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;

/// Error type for key-value storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Storage
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Opaque get/set/delete persistence.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Volatile store, used by tests and as a fallback when no data dir is set.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// Typed view over a [`KvStore`] with every key namespaced by `prefix`.
#[derive(Clone)]
pub struct PrefixedStore {
    inner: Arc<dyn KvStore>,
    prefix: String,
}

impl PrefixedStore {
    pub fn new(inner: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }

    /// Read and deserialize a value. Missing keys yield `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.inner.get(&self.full_key(key)).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let value = serde_json::to_value(value)?;
        self.inner.set(&self.full_key(key), value).await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(&self.full_key(key)).await
    }
}
