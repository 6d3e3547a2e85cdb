// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-chain query context.
//!
//! Everything a query object needs to know about a chain: its transport,
//! the wire format of its confidential contract runtime and its code hash
//! cache. Shared resources (response cache, encryption sessions, viewing
//! keys) live here too.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use super::cache::QueryCache;
use super::code_hash::ContractCodeHashCache;
use super::error::QueryError;
use super::secret20::ViewingKeyStore;
use super::secret_contract::WireFormat;
use super::session::EncryptionSessions;
use super::transport::Transport;
use crate::storage::{KvStore, PrefixedStore};

#[derive(Clone)]
struct ChainEntry {
    transport: Arc<dyn Transport>,
    wire: WireFormat,
    code_hashes: Arc<ContractCodeHashCache>,
}

pub struct QueryContext {
    kv: Arc<dyn KvStore>,
    chains: RwLock<HashMap<String, ChainEntry>>,
    cache: Arc<QueryCache>,
    sessions: Arc<EncryptionSessions>,
    viewing_keys: Arc<ViewingKeyStore>,
}

impl QueryContext {
    pub fn new(kv: Arc<dyn KvStore>, cache: Arc<QueryCache>) -> Self {
        Self {
            kv,
            chains: RwLock::new(HashMap::new()),
            cache,
            sessions: Arc::new(EncryptionSessions::new()),
            viewing_keys: Arc::new(ViewingKeyStore::new()),
        }
    }

    /// Configure `chain_id`. Replaces an earlier configuration.
    pub fn add_chain(&self, chain_id: &str, transport: Arc<dyn Transport>, wire: WireFormat) {
        let code_hashes = Arc::new(ContractCodeHashCache::new(
            transport.clone(),
            PrefixedStore::new(self.kv.clone(), format!("code-hash/{chain_id}")),
        ));
        if let Ok(mut chains) = self.chains.write() {
            chains.insert(
                chain_id.to_string(),
                ChainEntry {
                    transport,
                    wire,
                    code_hashes,
                },
            );
        }
        info!(chain_id, "Chain configured for queries");
    }

    fn entry(&self, chain_id: &str) -> Result<ChainEntry, QueryError> {
        self.chains
            .read()
            .ok()
            .and_then(|chains| chains.get(chain_id).cloned())
            .ok_or_else(|| QueryError::UnknownChain(chain_id.to_string()))
    }

    pub fn transport(&self, chain_id: &str) -> Result<Arc<dyn Transport>, QueryError> {
        Ok(self.entry(chain_id)?.transport)
    }

    pub fn wire_format(&self, chain_id: &str) -> Result<WireFormat, QueryError> {
        Ok(self.entry(chain_id)?.wire)
    }

    pub fn code_hashes(&self, chain_id: &str) -> Result<Arc<ContractCodeHashCache>, QueryError> {
        Ok(self.entry(chain_id)?.code_hashes)
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<EncryptionSessions> {
        &self.sessions
    }

    pub fn viewing_keys(&self) -> &Arc<ViewingKeyStore> {
        &self.viewing_keys
    }
}
