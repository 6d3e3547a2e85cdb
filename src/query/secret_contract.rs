// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Encrypted Contract Queries
//!
//! Queries against confidential contracts are encrypted per request with the
//! chain's encryption session and the contract's code hash, and only the
//! nonce of that request can decrypt the answer.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> AwaitingPrerequisites -> Encrypting -> Ready
//!     -> Fetching -> Decrypting -> Resolved | Failed
//! ```
//!
//! - An empty contract address fails at construction and never progresses.
//! - Once the chain has a session, the query encrypts its object once
//!   ahead of the first fetch. This happens at most once per query object;
//!   later session changes do not re-trigger it.
//! - Every encrypted request is sent exactly once. Each later fetch, and any
//!   fetch after a failure, encrypts again with a fresh nonce.
//! - A cancelled fetch discards its response and leaves the observable state
//!   as it was. A fetch is cancellable from the moment it starts, including
//!   while it encrypts; a request encrypted but never sent is kept for the
//!   next fetch.
//!
//! ## Wire Format
//!
//! ```text
//! request:  GET /wasm/contract/{addr}/query/{hex(base64(payload))}?encoding=hex
//! response: {"height": "...", "result": {"smart": base64(ciphertext)}}
//! ```
//!
//! The decrypted answer is base64 decoded `decode_rounds` times, then the
//! first `header_len` bytes (the echoed code hash) are dropped and the rest
//! is parsed as JSON. See [`WireFormat`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64ct::{Base64, Encoding};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::{CachedResponse, QueryCache};
use super::chain_query::{FetchTurn, QueryCell, QueryResponse, QueryState, ResultEnvelope};
use super::code_hash::ContractCodeHashCache;
use super::context::QueryContext;
use super::error::QueryError;
use super::observable::Subject;
use super::session::EncryptionSessions;
use super::transport::{Transport, TransportResponse};

// =============================================================================
// Wire Format
// =============================================================================

/// Byte layout of encrypted queries for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFormat {
    /// Leading bytes of the encryption output that form the nonce.
    pub nonce_len: usize,
    /// Keep the nonce in the payload sent to the chain.
    pub send_nonce: bool,
    /// Base64 layers around the decrypted answer.
    pub decode_rounds: usize,
    /// Echoed code hash in front of the decoded answer.
    pub header_len: usize,
}

impl Default for WireFormat {
    fn default() -> Self {
        Self {
            nonce_len: 32,
            send_nonce: false,
            decode_rounds: 2,
            header_len: 64,
        }
    }
}

impl WireFormat {
    /// Layout that sends the whole encryption output, nonce included, and
    /// decodes a single base64 layer without a header.
    pub fn full_envelope() -> Self {
        Self {
            nonce_len: 32,
            send_nonce: true,
            decode_rounds: 1,
            header_len: 0,
        }
    }
}

/// Where a query object is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryPhase {
    Uninitialized,
    AwaitingPrerequisites,
    Encrypting,
    Ready,
    Fetching,
    Decrypting,
    Resolved,
    Failed,
}

#[derive(Debug, Clone)]
struct EncryptedRequest {
    obj: Value,
    nonce: Vec<u8>,
    url: String,
}

type ResponseCheck<T> = Box<dyn Fn(&T) -> Result<(), QueryError> + Send + Sync>;

// =============================================================================
// Secret Contract Query
// =============================================================================

pub struct SecretContractQuery<T> {
    chain_id: String,
    contract_address: String,
    transport: Arc<dyn Transport>,
    wire: WireFormat,
    sessions: Arc<EncryptionSessions>,
    code_hashes: Arc<ContractCodeHashCache>,
    cache: Arc<QueryCache>,
    obj: Mutex<Value>,
    blocked: Mutex<Option<QueryError>>,
    phase: Subject<QueryPhase>,
    /// Encrypted ahead of time and not sent yet.
    prepared: Mutex<Option<EncryptedRequest>>,
    /// Most recent encryption.
    current: Mutex<Option<EncryptedRequest>>,
    check: Option<ResponseCheck<T>>,
    latch: CancellationToken,
    latch_consumed: AtomicBool,
    cell: QueryCell<T>,
}

impl<T> SecretContractQuery<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create the query and start waiting for its prerequisites. Must be
    /// called inside a Tokio runtime.
    pub fn new(
        ctx: &QueryContext,
        chain_id: &str,
        contract_address: &str,
        obj: Value,
    ) -> Result<Arc<Self>, QueryError> {
        Self::create(ctx, chain_id, contract_address, obj, None)
    }

    /// Like [`new`](Self::new), with a check run on every decrypted answer.
    /// A failing check fails the fetch.
    pub fn with_response_check<F>(
        ctx: &QueryContext,
        chain_id: &str,
        contract_address: &str,
        obj: Value,
        check: F,
    ) -> Result<Arc<Self>, QueryError>
    where
        F: Fn(&T) -> Result<(), QueryError> + Send + Sync + 'static,
    {
        Self::create(ctx, chain_id, contract_address, obj, Some(Box::new(check)))
    }

    fn create(
        ctx: &QueryContext,
        chain_id: &str,
        contract_address: &str,
        obj: Value,
        check: Option<ResponseCheck<T>>,
    ) -> Result<Arc<Self>, QueryError> {
        let query = Arc::new(Self {
            chain_id: chain_id.to_string(),
            contract_address: contract_address.to_string(),
            transport: ctx.transport(chain_id)?,
            wire: ctx.wire_format(chain_id)?,
            sessions: ctx.sessions().clone(),
            code_hashes: ctx.code_hashes(chain_id)?,
            cache: ctx.cache().clone(),
            obj: Mutex::new(obj),
            blocked: Mutex::new(None),
            phase: Subject::new(QueryPhase::Uninitialized),
            prepared: Mutex::new(None),
            current: Mutex::new(None),
            check,
            latch: CancellationToken::new(),
            latch_consumed: AtomicBool::new(false),
            cell: QueryCell::default(),
        });

        if contract_address.is_empty() {
            query.block(QueryError::ContractAddressEmpty);
            return Ok(query);
        }

        query.phase.set(QueryPhase::AwaitingPrerequisites);
        query.start_latch();
        Ok(query)
    }

    /// Wait for the chain's session, then encrypt once ahead of the first
    /// fetch. The session receiver is this task's only subscription and is
    /// released when the task ends.
    fn start_latch(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let cancelled = self.latch.clone();
        let mut session = self.sessions.subject(&self.chain_id).receiver();

        tokio::spawn(async move {
            let arrived = async {
                loop {
                    if session.borrow_and_update().is_some() {
                        return true;
                    }
                    if session.changed().await.is_err() {
                        return false;
                    }
                }
            };
            let available = tokio::select! {
                _ = cancelled.cancelled() => false,
                available = arrived => available,
            };
            drop(session);
            if !available {
                return;
            }
            if let Some(query) = weak.upgrade() {
                query.prepare().await;
            }
        });
    }

    async fn prepare(&self) {
        if self.latch_consumed.swap(true, Ordering::AcqRel) {
            return;
        }

        let _turn = match self.cell.acquire().await {
            FetchTurn::Run(guard) => guard,
            FetchTurn::Completed(_) => return,
        };
        if self.blocked_error().is_some() || self.lock_prepared().is_some() {
            return;
        }

        let obj = self.obj();
        match self.encrypt(&obj).await {
            Ok(request) => {
                if let Ok(mut prepared) = self.prepared.lock() {
                    *prepared = Some(request);
                }
            }
            Err(error) => {
                warn!(contract_address = %self.contract_address, %error, "Failed to prepare encrypted query");
                self.phase.set(QueryPhase::Failed);
                self.cell.set_error(Some(error));
            }
        }
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    pub fn obj(&self) -> Value {
        self.obj.lock().map(|obj| obj.clone()).unwrap_or(Value::Null)
    }

    /// Replace the plaintext query object. An unsent encrypted request for
    /// the previous object is dropped, and a block is lifted.
    pub fn set_obj(&self, obj: Value) {
        if self.contract_address.is_empty() {
            return;
        }
        let changed = match self.obj.lock() {
            Ok(mut current) if *current != obj => {
                *current = obj;
                true
            }
            _ => false,
        };
        if changed {
            if let Ok(mut prepared) = self.prepared.lock() {
                *prepared = None;
            }
        }

        let was_blocked = self.blocked.lock().ok().and_then(|mut b| b.take());
        if let Some(error) = was_blocked {
            if self.cell.error().as_ref() == Some(&error) {
                self.cell.set_error(None);
            }
            if self.phase.get() == QueryPhase::Failed {
                self.phase.set(QueryPhase::AwaitingPrerequisites);
            }
        }
    }

    /// Hold the query in a failed state: fetches return `error` without any
    /// request until [`set_obj`](Self::set_obj) is called.
    pub fn block(&self, error: QueryError) {
        if let Ok(mut blocked) = self.blocked.lock() {
            *blocked = Some(error.clone());
        }
        if let Ok(mut prepared) = self.prepared.lock() {
            *prepared = None;
        }
        self.cell.set_error(Some(error));
        self.phase.set(QueryPhase::Failed);
    }

    fn blocked_error(&self) -> Option<QueryError> {
        self.blocked.lock().ok().and_then(|b| b.clone())
    }

    fn lock_prepared(&self) -> Option<EncryptedRequest> {
        self.prepared.lock().ok().and_then(|p| p.clone())
    }

    /// The prepared request, if it was encrypted for `obj`. Taking it means
    /// it will be sent; it is never handed out twice.
    fn take_prepared(&self, obj: &Value) -> Option<EncryptedRequest> {
        let mut prepared = self.prepared.lock().ok()?;
        match prepared.take() {
            Some(request) if request.obj == *obj => Some(request),
            _ => None,
        }
    }

    // =========================================================================
    // Observable State
    // =========================================================================

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    pub fn phase(&self) -> QueryPhase {
        self.phase.get()
    }

    pub fn phase_subject(&self) -> Subject<QueryPhase> {
        self.phase.clone()
    }

    pub fn state(&self) -> QueryState<T> {
        self.cell.state()
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

    /// Nonce of the most recent encryption.
    pub fn nonce(&self) -> Option<Vec<u8>> {
        self.current.lock().ok()?.as_ref().map(|r| r.nonce.clone())
    }

    /// URL of the most recent encryption.
    pub fn url(&self) -> Option<String> {
        self.current.lock().ok()?.as_ref().map(|r| r.url.clone())
    }

    /// Whether the ahead-of-time encryption has run.
    pub fn latch_consumed(&self) -> bool {
        self.latch_consumed.load(Ordering::Acquire)
    }

    /// Stable identity of the logical query: independent of nonce and
    /// ciphertext, so every encryption of the same object shares it.
    pub fn cache_key(&self) -> String {
        format!(
            "{}/wasm/contract/{}/query/{}?encoding=json",
            self.transport.base_url(),
            self.contract_address,
            canonical_json(&self.obj())
        )
    }

    pub fn cancel(&self) {
        self.cell.cancel();
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    pub async fn fetch(&self) -> Result<QueryResponse<T>, QueryError> {
        if let Some(error) = self.blocked_error() {
            return Err(error);
        }

        let _turn = match self.cell.acquire().await {
            FetchTurn::Run(guard) => guard,
            FetchTurn::Completed(outcome) => return outcome,
        };
        if let Some(error) = self.blocked_error() {
            return Err(error);
        }

        let phase_before = self.phase.get();
        let obj = self.obj();
        let cache_key = self.cache_key();
        self.cell.serve_stale(self.cache.get(&cache_key));

        // Cancellable from here on, encryption included.
        let token = self.cell.begin();
        let request = match self.take_prepared(&obj) {
            Some(request) => request,
            None => match self.encrypt(&obj).await {
                Ok(request) => request,
                Err(_) if token.is_cancelled() => return Err(self.cancelled(phase_before)),
                Err(error) => return Err(self.failed(error)),
            },
        };
        if token.is_cancelled() {
            // Never sent, so its nonce is still unused.
            if let Ok(mut prepared) = self.prepared.lock() {
                *prepared = Some(request);
            }
            return Err(self.cancelled(phase_before));
        }

        self.phase.set(QueryPhase::Fetching);
        let result = self.transport.fetch(&request.url, &token).await;
        if token.is_cancelled() || matches!(result, Err(QueryError::Cancelled)) {
            return Err(self.cancelled(phase_before));
        }
        let response = match result {
            Ok(response) => response,
            Err(error) => return Err(self.failed(error)),
        };

        self.phase.set(QueryPhase::Decrypting);
        match self.decrypt(response, &request.nonce).await {
            Ok((data, raw, status)) => {
                self.cache.put(
                    cache_key,
                    CachedResponse {
                        data: raw,
                        status,
                        timestamp: Utc::now(),
                    },
                );
                let response = self.cell.resolve(data, status);
                self.phase.set(QueryPhase::Resolved);
                Ok(response)
            }
            Err(error) => Err(self.failed(error)),
        }
    }

    fn cancelled(&self, phase_before: QueryPhase) -> QueryError {
        debug!(contract_address = %self.contract_address, "Encrypted query cancelled");
        self.phase.set(phase_before);
        self.cell.abandon()
    }

    fn failed(&self, error: QueryError) -> QueryError {
        debug!(contract_address = %self.contract_address, %error, "Encrypted query failed");
        self.phase.set(QueryPhase::Failed);
        self.cell.fail(error)
    }

    async fn encrypt(&self, obj: &Value) -> Result<EncryptedRequest, QueryError> {
        self.phase.set(QueryPhase::AwaitingPrerequisites);
        let session = self
            .sessions
            .get(&self.chain_id)
            .ok_or(QueryError::SessionUnavailable)?;
        let code_hash = self.code_hashes.code_hash(&self.contract_address).await?;

        self.phase.set(QueryPhase::Encrypting);
        let ciphertext = session.encrypt(&code_hash, obj).await?;
        let nonce_len = self.wire.nonce_len;
        if ciphertext.len() < nonce_len {
            return Err(QueryError::Encryption(format!(
                "ciphertext of {} bytes is shorter than the nonce",
                ciphertext.len()
            )));
        }

        let nonce = ciphertext[..nonce_len].to_vec();
        let payload = if self.wire.send_nonce {
            &ciphertext[..]
        } else {
            &ciphertext[nonce_len..]
        };
        let encoded = hex::encode(Base64::encode_string(payload));
        let request = EncryptedRequest {
            obj: obj.clone(),
            nonce,
            url: format!(
                "/wasm/contract/{}/query/{}?encoding=hex",
                self.contract_address, encoded
            ),
        };

        if let Ok(mut current) = self.current.lock() {
            *current = Some(request.clone());
        }
        self.phase.set(QueryPhase::Ready);
        Ok(request)
    }

    async fn decrypt(&self, response: TransportResponse, nonce: &[u8]) -> Result<(T, Value, u16), QueryError> {
        let session = self
            .sessions
            .get(&self.chain_id)
            .ok_or(QueryError::SessionUnavailable)?;
        if nonce.is_empty() {
            return Err(QueryError::NonceUnknown);
        }
        let data = response.data.ok_or(QueryError::EmptyResponse)?;

        let envelope: ResultEnvelope<SmartResult> =
            serde_json::from_value(data).map_err(|e| QueryError::Protocol(e.to_string()))?;
        let ciphertext = Base64::decode_vec(&envelope.result.smart)
            .map_err(|e| QueryError::Protocol(format!("result is not base64: {e}")))?;

        let mut payload = session.decrypt(&ciphertext, nonce).await?;
        for _ in 0..self.wire.decode_rounds {
            let text = std::str::from_utf8(&payload)
                .map_err(|e| QueryError::Protocol(format!("decrypted answer is not text: {e}")))?;
            payload = Base64::decode_vec(text.trim())
                .map_err(|e| QueryError::Protocol(format!("decrypted answer is not base64: {e}")))?;
        }

        let header_len = self.wire.header_len;
        if payload.len() < header_len {
            return Err(QueryError::Protocol(format!(
                "decrypted answer of {} bytes is shorter than its header",
                payload.len()
            )));
        }
        let raw: Value =
            serde_json::from_slice(&payload[header_len..]).map_err(|e| QueryError::Protocol(e.to_string()))?;
        let data: T = serde_json::from_value(raw.clone()).map_err(|e| QueryError::Protocol(e.to_string()))?;
        if let Some(check) = &self.check {
            check(&data)?;
        }
        Ok((data, raw, response.status))
    }
}

impl<T> Drop for SecretContractQuery<T> {
    fn drop(&mut self) {
        self.latch.cancel();
    }
}

#[derive(Debug, Deserialize)]
struct SmartResult {
    smart: String,
}

/// JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}
