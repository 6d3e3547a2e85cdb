// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-chain encryption sessions.
//!
//! The session primitive (key exchange with the chain's enclave, per-query
//! encryption) lives outside this crate. The wallet installs one session per
//! chain once it is available; queries observe the chain's [`Subject`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::error::QueryError;
use super::observable::Subject;

/// Encryption primitive of one chain.
#[async_trait]
pub trait EncryptionUtils: Send + Sync {
    /// Encrypt a query for the contract with `code_hash`. The output starts
    /// with the nonce the response must be decrypted with.
    async fn encrypt(&self, code_hash: &str, msg: &Value) -> Result<Vec<u8>, QueryError>;

    async fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, QueryError>;
}

pub type SessionSubject = Subject<Option<Arc<dyn EncryptionUtils>>>;

#[derive(Default)]
pub struct EncryptionSessions {
    sessions: Mutex<HashMap<String, SessionSubject>>,
}

impl EncryptionSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observable session slot of `chain_id`, created empty on first use.
    pub fn subject(&self, chain_id: &str) -> SessionSubject {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions
                .entry(chain_id.to_string())
                .or_insert_with(|| Subject::new(None))
                .clone(),
            Err(_) => Subject::new(None),
        }
    }

    pub fn get(&self, chain_id: &str) -> Option<Arc<dyn EncryptionUtils>> {
        self.subject(chain_id).get()
    }

    pub fn install(&self, chain_id: &str, session: Arc<dyn EncryptionUtils>) {
        self.subject(chain_id).set(Some(session));
        info!(chain_id, "Encryption session installed");
    }

    pub fn remove(&self, chain_id: &str) {
        self.subject(chain_id).set(None);
        info!(chain_id, "Encryption session removed");
    }
}
