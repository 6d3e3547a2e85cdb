// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contract code hash cache.
//!
//! A deployed contract's code hash never changes, so a fetched hash is
//! persisted under `code-hash/{chain}/{contract}` and never fetched again.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::chain_query::{ChainQuery, ResultEnvelope};
use super::error::QueryError;
use super::transport::Transport;
use crate::storage::PrefixedStore;

pub type CodeHashQuery = ChainQuery<ResultEnvelope<String>>;

/// Code hash lookups of one chain, one shared query per contract.
pub struct ContractCodeHashCache {
    transport: Arc<dyn Transport>,
    store: PrefixedStore,
    queries: Mutex<HashMap<String, Arc<CodeHashQuery>>>,
}

impl ContractCodeHashCache {
    pub fn new(transport: Arc<dyn Transport>, store: PrefixedStore) -> Self {
        Self {
            transport,
            store,
            queries: Mutex::new(HashMap::new()),
        }
    }

    /// The shared query for `contract_address`, resolved up front if the hash
    /// was persisted earlier.
    pub async fn get_query(&self, contract_address: &str) -> Arc<CodeHashQuery> {
        let mut queries = self.queries.lock().await;
        if let Some(query) = queries.get(contract_address) {
            return query.clone();
        }

        let url = format!("/wasm/contract/{contract_address}/code-hash");
        let query = if contract_address.is_empty() {
            CodeHashQuery::blocked(self.transport.clone(), url, QueryError::ContractAddressEmpty)
        } else {
            match self.store.get::<String>(contract_address).await {
                Ok(Some(hash)) => {
                    debug!(contract_address, "Code hash loaded from storage");
                    CodeHashQuery::resolved(
                        self.transport.clone(),
                        url,
                        ResultEnvelope {
                            height: String::new(),
                            result: hash,
                        },
                    )
                }
                Ok(None) => CodeHashQuery::new(self.transport.clone(), url),
                Err(e) => {
                    warn!(contract_address, error = %e, "Failed to read persisted code hash");
                    CodeHashQuery::new(self.transport.clone(), url)
                }
            }
        };

        let query = Arc::new(query);
        queries.insert(contract_address.to_string(), query.clone());
        query
    }

    /// Code hash of `contract_address`, fetched at most once per process.
    ///
    /// Persisting the hash is best-effort: when the write fails the hash is
    /// still served from the shared query and only refetched after a restart.
    pub async fn code_hash(&self, contract_address: &str) -> Result<String, QueryError> {
        let query = self.get_query(contract_address).await;
        if let Some(response) = query.response() {
            return Ok(response.data.result);
        }

        let response = query.fetch().await?;
        let hash = response.data.result;
        if let Err(e) = self.store.set(contract_address, &hash).await {
            warn!(contract_address, error = %e, "Failed to persist code hash");
        }
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::{code_hash_response, MockTransport, CODE_HASH};
    use crate::storage::{KvStore, MemoryKvStore};

    const CONTRACT: &str = "secret18vd8fpwxzck93qlwghaj6arh4p7c5n8978vsyg";

    #[tokio::test]
    async fn fetched_once_and_persisted() {
        let transport = MockTransport::new();
        transport.respond("/wasm/contract/", code_hash_response());
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());

        let cache = ContractCodeHashCache::new(transport.clone(), PrefixedStore::new(kv.clone(), "code-hash/secret-4"));
        assert_eq!(cache.code_hash(CONTRACT).await.unwrap(), CODE_HASH);
        assert_eq!(cache.code_hash(CONTRACT).await.unwrap(), CODE_HASH);
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            transport.paths()[0],
            format!("/wasm/contract/{CONTRACT}/code-hash")
        );

        // A fresh cache over the same storage never hits the network.
        let restarted = ContractCodeHashCache::new(transport.clone(), PrefixedStore::new(kv, "code-hash/secret-4"));
        assert_eq!(restarted.code_hash(CONTRACT).await.unwrap(), CODE_HASH);
        assert_eq!(transport.calls(), 1);
    }

    struct ReadOnlyStore(MemoryKvStore);

    #[async_trait::async_trait]
    impl KvStore for ReadOnlyStore {
        async fn get(&self, key: &str) -> crate::storage::StorageResult<Option<serde_json::Value>> {
            self.0.get(key).await
        }

        async fn set(&self, _key: &str, _value: serde_json::Value) -> crate::storage::StorageResult<()> {
            Err(crate::storage::StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        async fn delete(&self, key: &str) -> crate::storage::StorageResult<()> {
            self.0.delete(key).await
        }
    }

    #[tokio::test]
    async fn failed_persist_still_serves_the_hash() {
        let transport = MockTransport::new();
        transport.respond("/wasm/contract/", code_hash_response());
        let kv: Arc<dyn KvStore> = Arc::new(ReadOnlyStore(MemoryKvStore::new()));

        let cache = ContractCodeHashCache::new(transport.clone(), PrefixedStore::new(kv, "code-hash/secret-4"));
        assert_eq!(cache.code_hash(CONTRACT).await.unwrap(), CODE_HASH);
        assert_eq!(cache.code_hash(CONTRACT).await.unwrap(), CODE_HASH);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn empty_contract_address() {
        let transport = MockTransport::new();
        let cache = ContractCodeHashCache::new(
            transport.clone(),
            PrefixedStore::new(Arc::new(MemoryKvStore::new()), "code-hash/secret-4"),
        );
        assert_eq!(cache.code_hash("").await, Err(QueryError::ContractAddressEmpty));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn failure_is_observable_on_the_shared_query() {
        let transport = MockTransport::new();
        transport.fail("/wasm/contract/", QueryError::transport("unreachable"));
        let cache = ContractCodeHashCache::new(
            transport.clone(),
            PrefixedStore::new(Arc::new(MemoryKvStore::new()), "code-hash/secret-4"),
        );

        assert!(cache.code_hash(CONTRACT).await.is_err());
        let query = cache.get_query(CONTRACT).await;
        assert_eq!(query.error(), Some(QueryError::transport("unreachable")));
    }
}
