// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles for the transport and the encryption session.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::error::QueryError;
use super::session::EncryptionUtils;
use super::transport::{Transport, TransportResponse};

pub const BASE_URL: &str = "http://lcd.test";
pub const CODE_HASH: &str = "af74387e276be8874f07bec3a87023ee49b0e7ebe08178c49d0a49c3c98ed60e";

type Responder = Arc<dyn Fn(&str) -> Result<TransportResponse, QueryError> + Send + Sync>;

/// Transport answering from registered path prefixes. The most recently
/// registered matching prefix wins.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(String, Responder)>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond_with<F>(&self, prefix: &str, f: F)
    where
        F: Fn(&str) -> Result<TransportResponse, QueryError> + Send + Sync + 'static,
    {
        self.routes.lock().unwrap().push((prefix.to_string(), Arc::new(f)));
    }

    pub fn respond(&self, prefix: &str, data: Value) {
        self.respond_with(prefix, move |_| {
            Ok(TransportResponse {
                status: 200,
                data: Some(data.clone()),
            })
        });
    }

    pub fn fail(&self, prefix: &str, error: QueryError) {
        self.respond_with(prefix, move |_| Err(error.clone()));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| p.starts_with(prefix)).count()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn fetch(&self, path: &str, cancel: &CancellationToken) -> Result<TransportResponse, QueryError> {
        self.calls.lock().unwrap().push(path.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(QueryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let responder = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(_, f)| f.clone());
        match responder {
            Some(f) => f(path),
            None => Err(QueryError::Transport {
                status: Some(404),
                message: format!("no route for {path}"),
            }),
        }
    }
}

/// Encryption session whose "ciphertext" is `nonce || json(msg)` and whose
/// decrypt is the identity for any nonce it issued.
#[derive(Default)]
pub struct MockEncryption {
    counter: AtomicU64,
    issued: Mutex<HashSet<Vec<u8>>>,
    decrypted_with: Mutex<Vec<Vec<u8>>>,
    encrypts: AtomicUsize,
    encrypt_delay: Mutex<Option<Duration>>,
}

impl MockEncryption {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn encrypt_calls(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn decrypt_nonces(&self) -> Vec<Vec<u8>> {
        self.decrypted_with.lock().unwrap().clone()
    }

    pub fn set_encrypt_delay(&self, delay: Option<Duration>) {
        *self.encrypt_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl EncryptionUtils for MockEncryption {
    async fn encrypt(&self, _code_hash: &str, msg: &Value) -> Result<Vec<u8>, QueryError> {
        let delay = *self.encrypt_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut nonce = vec![0u8; 32];
        nonce[..8].copy_from_slice(&n.to_be_bytes());
        self.issued.lock().unwrap().insert(nonce.clone());

        let mut out = nonce;
        out.extend(serde_json::to_vec(msg).map_err(|e| QueryError::Encryption(e.to_string()))?);
        Ok(out)
    }

    async fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, QueryError> {
        if !self.issued.lock().unwrap().contains(nonce) {
            return Err(QueryError::Encryption("unknown nonce".to_string()));
        }
        self.decrypted_with.lock().unwrap().push(nonce.to_vec());
        Ok(ciphertext.to_vec())
    }
}

/// Plaintext query object carried by a mock encrypted query URL.
pub fn query_msg_of(path: &str) -> Value {
    let encoded = path
        .split("/query/")
        .nth(1)
        .and_then(|rest| rest.split('?').next())
        .unwrap();
    let b64 = String::from_utf8(hex::decode(encoded).unwrap()).unwrap();
    serde_json::from_slice(&STANDARD.decode(b64).unwrap()).unwrap()
}

/// LCD envelope carrying `data` the way the contract runtime returns it:
/// echoed code hash header, two base64 layers, then the transport layer.
pub fn contract_response(data: &Value) -> TransportResponse {
    let mut payload = CODE_HASH.as_bytes().to_vec();
    payload.extend(serde_json::to_vec(data).unwrap());
    let once = STANDARD.encode(payload);
    let twice = STANDARD.encode(once);
    TransportResponse {
        status: 200,
        data: Some(json!({
            "height": "100",
            "result": {"smart": STANDARD.encode(twice)}
        })),
    }
}

pub fn code_hash_response() -> Value {
    json!({"height": "100", "result": CODE_HASH})
}

/// Wait until `condition` holds, failing the test after two seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
