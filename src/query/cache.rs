// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared LRU cache of query responses.
//!
//! Entries are keyed by the logical identity of a query. A cached value is
//! surfaced as stale until the query fetches a fresh response.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde_json::Value;
use tracing::warn;

/// Default number of cached responses.
pub const DEFAULT_CAPACITY: usize = 512;

/// Default time-to-live of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Last good response of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub data: Value,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

struct CacheEntry {
    response: CachedResponse,
    inserted_at: Instant,
}

/// In-process LRU cache with a per-entry TTL.
pub struct QueryCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    /// Entries stay consistent across a panic in another holder, so a
    /// poisoned lock is recovered rather than treated as an empty cache.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("Query cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Cached response for `key`. Expired entries are evicted and yield `None`.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let mut cache = self.lock();
        if let Some(entry) = cache.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.response.clone());
            }
            cache.pop(key);
        }
        None
    }

    pub fn put(&self, key: impl Into<String>, response: CachedResponse) {
        self.lock().put(
            key.into(),
            CacheEntry {
                response,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().pop(key);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
