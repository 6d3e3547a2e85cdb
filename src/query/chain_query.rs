// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain Queries
//!
//! [`QueryCell`] is the observable state every query object exposes:
//! `response`, `is_fetching` and `error`. It also serializes fetches: a
//! trigger that arrives while another fetch runs waits for it, and if that
//! fetch completed in the meantime the waiter returns its outcome instead
//! of issuing a second request.
//!
//! [`ChainQuery`] is a plain GET against the chain REST endpoint built on a
//! [`QueryCell`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{watch, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cache::{CachedResponse, QueryCache};
use super::error::QueryError;
use super::observable::Subject;
use super::transport::{Transport, TransportResponse};

// =============================================================================
// Response Types
// =============================================================================

/// `{height, result}` envelope of LCD responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    #[serde(default)]
    pub height: String,
    pub result: T,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse<T> {
    pub data: T,
    pub status: u16,
    /// Served from cache, a fresh response has not arrived yet.
    pub staled: bool,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of a query object.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub response: Option<QueryResponse<T>>,
    pub error: Option<QueryError>,
    pub is_fetching: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            response: None,
            error: None,
            is_fetching: false,
        }
    }
}

// =============================================================================
// Query Cell
// =============================================================================

/// Outcome of waiting for a fetch turn.
pub(crate) enum FetchTurn<'a, T> {
    /// This caller runs the fetch while holding the guard.
    Run(MutexGuard<'a, ()>),
    /// Another fetch completed while this caller waited.
    Completed(Result<QueryResponse<T>, QueryError>),
}

pub struct QueryCell<T> {
    state: Subject<QueryState<T>>,
    fetch_lock: tokio::sync::Mutex<()>,
    completed: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
}

impl<T: Clone + Send + Sync + 'static> Default for QueryCell<T> {
    fn default() -> Self {
        Self::with_state(QueryState::default())
    }
}

impl<T: Clone + Send + Sync + 'static> QueryCell<T> {
    pub fn with_state(state: QueryState<T>) -> Self {
        Self {
            state: Subject::new(state),
            fetch_lock: tokio::sync::Mutex::new(()),
            completed: AtomicU64::new(0),
            in_flight: Mutex::new(None),
        }
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.get()
    }

    pub fn response(&self) -> Option<QueryResponse<T>> {
        self.state.get().response
    }

    pub fn error(&self) -> Option<QueryError> {
        self.state.get().error
    }

    pub fn is_fetching(&self) -> bool {
        self.state.get().is_fetching
    }

    pub fn subscribe(&self) -> watch::Receiver<QueryState<T>> {
        self.state.receiver()
    }

    /// Number of fetches that reached a result.
    pub fn completed_fetches(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub(crate) async fn acquire(&self) -> FetchTurn<'_, T> {
        let seen = self.completed.load(Ordering::Acquire);
        let guard = self.fetch_lock.lock().await;
        if self.completed.load(Ordering::Acquire) != seen {
            return FetchTurn::Completed(self.outcome());
        }
        FetchTurn::Run(guard)
    }

    /// Result of the last completed fetch.
    pub(crate) fn outcome(&self) -> Result<QueryResponse<T>, QueryError> {
        let state = self.state.get();
        match (state.error, state.response) {
            (Some(error), _) => Err(error),
            (None, Some(response)) => Ok(response),
            (None, None) => Err(QueryError::Cancelled),
        }
    }

    /// Mark a fetch in flight and hand out its cancellation token.
    pub(crate) fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut in_flight) = self.in_flight.lock() {
            *in_flight = Some(token.clone());
        }
        self.state.update(|s| s.is_fetching = true);
        token
    }

    /// Abort the in-flight fetch, if any.
    pub fn cancel(&self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            if let Some(token) = in_flight.take() {
                token.cancel();
            }
        }
    }

    fn end(&self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            *in_flight = None;
        }
    }

    pub(crate) fn resolve(&self, data: T, status: u16) -> QueryResponse<T> {
        let response = QueryResponse {
            data,
            status,
            staled: false,
            timestamp: Utc::now(),
        };
        self.end();
        self.state.update(|s| {
            s.response = Some(response.clone());
            s.error = None;
            s.is_fetching = false;
        });
        self.completed.fetch_add(1, Ordering::AcqRel);
        response
    }

    /// Record a failed fetch. The previous response is kept.
    pub(crate) fn fail(&self, error: QueryError) -> QueryError {
        self.end();
        self.state.update(|s| {
            s.error = Some(error.clone());
            s.is_fetching = false;
        });
        self.completed.fetch_add(1, Ordering::AcqRel);
        error
    }

    /// A cancelled fetch leaves response and error untouched.
    pub(crate) fn abandon(&self) -> QueryError {
        self.end();
        self.state.update(|s| s.is_fetching = false);
        QueryError::Cancelled
    }

    /// Set an error without a fetch, e.g. when a precondition is missing.
    pub(crate) fn set_error(&self, error: Option<QueryError>) {
        self.state.update(|s| s.error = error);
    }

    /// Surface a cached response as stale while no response is known.
    pub(crate) fn serve_stale(&self, cached: Option<CachedResponse>)
    where
        T: DeserializeOwned,
    {
        if self.state.get().response.is_some() {
            return;
        }
        let Some(cached) = cached else { return };
        let Ok(data) = serde_json::from_value::<T>(cached.data) else {
            return;
        };
        self.state.update(|s| {
            s.response = Some(QueryResponse {
                data,
                status: cached.status,
                staled: true,
                timestamp: cached.timestamp,
            });
        });
    }
}

// =============================================================================
// Chain Query
// =============================================================================

/// Plain GET query against the chain REST endpoint.
pub struct ChainQuery<T> {
    transport: Arc<dyn Transport>,
    url: String,
    cache: Option<Arc<QueryCache>>,
    /// Set when the query can never be fetched.
    blocked: Option<QueryError>,
    cell: QueryCell<T>,
}

impl<T> ChainQuery<T>
where
    T: DeserializeOwned + Serialize + Clone + Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            cache: None,
            blocked: None,
            cell: QueryCell::default(),
        }
    }

    /// A query that reports `error` and never fetches.
    pub fn blocked(transport: Arc<dyn Transport>, url: impl Into<String>, error: QueryError) -> Self {
        let mut query = Self::new(transport, url);
        query.cell.set_error(Some(error.clone()));
        query.blocked = Some(error);
        query
    }

    /// A query that starts resolved with `data`, e.g. loaded from storage.
    pub fn resolved(transport: Arc<dyn Transport>, url: impl Into<String>, data: T) -> Self {
        let query = Self::new(transport, url);
        query.cell.resolve(data, 200);
        query
    }

    pub fn with_cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cache_key(&self) -> String {
        format!("{}{}", self.transport.base_url(), self.url)
    }

    pub fn cell(&self) -> &QueryCell<T> {
        &self.cell
    }

    pub fn response(&self) -> Option<QueryResponse<T>> {
        self.cell.response()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.cell.error()
    }

    pub fn is_fetching(&self) -> bool {
        self.cell.is_fetching()
    }

    pub fn cancel(&self) {
        self.cell.cancel();
    }

    pub async fn fetch(&self) -> Result<QueryResponse<T>, QueryError> {
        if let Some(error) = &self.blocked {
            return Err(error.clone());
        }

        let _turn = match self.cell.acquire().await {
            FetchTurn::Run(guard) => guard,
            FetchTurn::Completed(outcome) => return outcome,
        };

        let cache_key = self.cache_key();
        if let Some(cache) = &self.cache {
            self.cell.serve_stale(cache.get(&cache_key));
        }

        let token = self.cell.begin();
        let result = self.transport.fetch(&self.url, &token).await;
        if token.is_cancelled() {
            debug!(url = %self.url, "Chain query cancelled");
            return Err(self.cell.abandon());
        }

        match result.and_then(decode::<T>) {
            Ok((data, raw, status)) => {
                if let Some(cache) = &self.cache {
                    cache.put(
                        cache_key,
                        CachedResponse {
                            data: raw,
                            status,
                            timestamp: Utc::now(),
                        },
                    );
                }
                Ok(self.cell.resolve(data, status))
            }
            Err(QueryError::Cancelled) => Err(self.cell.abandon()),
            Err(error) => Err(self.cell.fail(error)),
        }
    }
}

fn decode<T: DeserializeOwned>(response: TransportResponse) -> Result<(T, Value, u16), QueryError> {
    let raw = response
        .data
        .ok_or_else(|| QueryError::Protocol("empty response body".to_string()))?;
    let data = serde_json::from_value(raw.clone()).map_err(|e| QueryError::Protocol(e.to_string()))?;
    Ok((data, raw, response.status))
}
