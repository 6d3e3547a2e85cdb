// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Secret20 Balances
//!
//! Token balances on confidential contracts are only readable with the
//! holder's viewing key. The balance query binds to the viewing key of its
//! (chain, contract) and rebuilds its query object whenever the key changes:
//!
//! ```json
//! { "balance": { "address": "secret1...", "key": "<viewing key>" } }
//! ```
//!
//! - Without a viewing key the query fails with "Viewing key is empty" and
//!   never reaches the network.
//! - A `viewing_key_error` answer fails the fetch with
//!   [`QueryError::WrongViewingKey`], a credential error the caller can fix
//!   by setting another key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::balances::{Balance, BalanceInner, BalanceRegistry, Coin};
use super::code_hash::CodeHashQuery;
use super::context::QueryContext;
use super::denom::{DenomHelper, DenomKind};
use super::error::QueryError;
use super::observable::{Subject, Subscription};
use super::secret_contract::{QueryPhase, SecretContractQuery};

// =============================================================================
// Viewing Keys
// =============================================================================

/// Viewing keys per (chain, contract), each an observable input.
#[derive(Default)]
pub struct ViewingKeyStore {
    keys: Mutex<HashMap<(String, String), Subject<String>>>,
}

impl ViewingKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Viewing key slot of a contract, created empty on first use.
    pub fn subject(&self, chain_id: &str, contract_address: &str) -> Subject<String> {
        match self.keys.lock() {
            Ok(mut keys) => keys
                .entry((chain_id.to_string(), contract_address.to_string()))
                .or_insert_with(|| Subject::new(String::new()))
                .clone(),
            Err(_) => Subject::new(String::new()),
        }
    }

    pub fn viewing_key(&self, chain_id: &str, contract_address: &str) -> String {
        self.subject(chain_id, contract_address).get()
    }

    pub fn set_viewing_key(&self, chain_id: &str, contract_address: &str, viewing_key: &str) {
        if self
            .subject(chain_id, contract_address)
            .set_if_changed(viewing_key.to_string())
        {
            debug!(chain_id, contract_address, "Viewing key changed");
        }
    }
}

// =============================================================================
// Balance Query
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAmount {
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewingKeyErrorBody {
    pub msg: String,
}

/// Answer of the `balance` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret20BalanceResult {
    #[serde(default)]
    pub balance: Option<BalanceAmount>,
    #[serde(default)]
    pub viewing_key_error: Option<ViewingKeyErrorBody>,
}

fn check_viewing_key(result: &Secret20BalanceResult) -> Result<(), QueryError> {
    match &result.viewing_key_error {
        Some(error) => Err(QueryError::WrongViewingKey(error.msg.clone())),
        None => Ok(()),
    }
}

fn balance_obj(address: &str, viewing_key: &str) -> Value {
    json!({"balance": {"address": address, "key": viewing_key}})
}

/// Point the inner query at the current inputs, or block it.
fn apply_inputs(query: &SecretContractQuery<Secret20BalanceResult>, address: &str, viewing_key: &str) {
    if query.contract_address().is_empty() {
        return;
    }
    if address.is_empty() {
        query.block(QueryError::AddressEmpty);
    } else if viewing_key.is_empty() {
        query.block(QueryError::ViewingKeyEmpty);
    } else {
        query.set_obj(balance_obj(address, viewing_key));
    }
}

/// Balance of one address on one token contract.
pub struct Secret20BalanceQuery {
    address: String,
    viewing_key: Subject<String>,
    query: Arc<SecretContractQuery<Secret20BalanceResult>>,
    _binding: Subscription,
}

impl Secret20BalanceQuery {
    pub fn new(
        ctx: &QueryContext,
        chain_id: &str,
        contract_address: &str,
        address: &str,
    ) -> Result<Self, QueryError> {
        let viewing_key = ctx.viewing_keys().subject(chain_id, contract_address);
        let query = SecretContractQuery::with_response_check(
            ctx,
            chain_id,
            contract_address,
            balance_obj(address, &viewing_key.get()),
            check_viewing_key,
        )?;
        apply_inputs(&query, address, &viewing_key.get());

        let weak: Weak<SecretContractQuery<Secret20BalanceResult>> = Arc::downgrade(&query);
        let bound_address = address.to_string();
        let binding = viewing_key.subscribe(move |key| {
            if let Some(query) = weak.upgrade() {
                apply_inputs(&query, &bound_address, &key);
            }
        });

        Ok(Self {
            address: address.to_string(),
            viewing_key,
            query,
            _binding: binding,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn contract_query(&self) -> &Arc<SecretContractQuery<Secret20BalanceResult>> {
        &self.query
    }

    pub fn phase(&self) -> QueryPhase {
        self.query.phase()
    }

    pub fn is_fetching(&self) -> bool {
        self.query.is_fetching()
    }

    pub fn error(&self) -> Option<QueryError> {
        self.query.error()
    }

    /// Raw amount of the last good answer.
    pub fn amount(&self) -> Option<String> {
        self.query.response()?.data.balance.map(|b| b.amount)
    }

    pub fn cancel(&self) {
        self.query.cancel();
    }

    /// Fetch with the viewing key as it is now.
    pub async fn fetch(&self) -> Result<Option<String>, QueryError> {
        apply_inputs(&self.query, &self.address, &self.viewing_key.get());
        let response = self.query.fetch().await?;
        Ok(response.data.balance.map(|b| b.amount))
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Secret20 balance of one address, with the code hash lookup folded into
/// its fetching and error state.
pub struct Secret20Balance {
    denom: DenomHelper,
    code_hash: Arc<CodeHashQuery>,
    query: Secret20BalanceQuery,
}

impl Secret20Balance {
    fn coin(&self, amount: Option<String>) -> Balance {
        match amount {
            Some(amount) => Balance::ready(Coin::new(self.denom.minimal_denom(), amount)),
            None => Balance::pending(self.denom.minimal_denom()),
        }
    }
}

#[async_trait]
impl BalanceInner for Secret20Balance {
    fn denom(&self) -> &DenomHelper {
        &self.denom
    }

    fn is_fetching(&self) -> bool {
        self.code_hash.is_fetching() || self.query.is_fetching()
    }

    fn error(&self) -> Option<QueryError> {
        self.code_hash.error().or_else(|| self.query.error())
    }

    fn balance(&self) -> Balance {
        self.coin(self.query.amount())
    }

    async fn fetch(&self) -> Result<Balance, QueryError> {
        let amount = self.query.fetch().await?;
        Ok(self.coin(amount))
    }
}

/// Serves `secret20` denominations.
pub struct Secret20BalanceRegistry {
    ctx: Arc<QueryContext>,
}

impl Secret20BalanceRegistry {
    pub fn new(ctx: Arc<QueryContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl BalanceRegistry for Secret20BalanceRegistry {
    async fn get_balance_inner(
        &self,
        chain_id: &str,
        address: &str,
        denom: &DenomHelper,
    ) -> Result<Option<Arc<dyn BalanceInner>>, QueryError> {
        if denom.kind() != &DenomKind::Secret20 {
            return Ok(None);
        }

        let contract_address = denom.contract_address();
        let code_hash = self
            .ctx
            .code_hashes(chain_id)?
            .get_query(contract_address)
            .await;
        let query = Secret20BalanceQuery::new(&self.ctx, chain_id, contract_address, address)?;

        Ok(Some(Arc::new(Secret20Balance {
            denom: denom.clone(),
            code_hash,
            query,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::balances::QueryBalances;
    use crate::query::cache::QueryCache;
    use crate::query::secret_contract::WireFormat;
    use crate::query::testing::{
        code_hash_response, contract_response, eventually, query_msg_of, MockEncryption, MockTransport,
    };
    use crate::storage::MemoryKvStore;

    const CHAIN: &str = "secret-4";
    const TOKEN: &str = "secret1k0jntykt7e4g3y88ltc60czgjuqdy4c9e8fzek";
    const HOLDER: &str = "secret1ap26qrlp8mcq2pg6r47w43l0y8zkqm8a450s03";

    struct Fixture {
        ctx: Arc<QueryContext>,
        transport: Arc<MockTransport>,
        session: Arc<MockEncryption>,
    }

    fn fixture() -> Fixture {
        let transport = MockTransport::new();
        transport.respond(&format!("/wasm/contract/{TOKEN}/code-hash"), code_hash_response());
        transport.respond_with(&format!("/wasm/contract/{TOKEN}/query/"), |path| {
            let msg = query_msg_of(path);
            if msg["balance"]["key"] == "api_key_good" {
                Ok(contract_response(&json!({"balance": {"amount": "250000"}})))
            } else {
                Ok(contract_response(&json!({"viewing_key_error": {
                    "msg": "Wrong viewing key for this address or viewing key not set"
                }})))
            }
        });

        let ctx = Arc::new(QueryContext::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(QueryCache::default()),
        ));
        ctx.add_chain(CHAIN, transport.clone(), WireFormat::default());
        let session = MockEncryption::new();
        ctx.sessions().install(CHAIN, session.clone());
        Fixture { ctx, transport, session }
    }

    #[tokio::test]
    async fn empty_viewing_key_blocks_without_network() {
        let f = fixture();
        let query = Secret20BalanceQuery::new(&f.ctx, CHAIN, TOKEN, HOLDER).unwrap();

        assert_eq!(query.error(), Some(QueryError::ViewingKeyEmpty));
        let err = query.fetch().await.unwrap_err();
        assert_eq!(err.to_string(), "Viewing key is empty");
        assert_eq!(err.kind(), ErrorKind::Credential);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(f.transport.calls(), 0);
        assert_eq!(f.session.encrypt_calls(), 0);
    }

    #[tokio::test]
    async fn setting_the_key_unblocks() {
        let f = fixture();
        let query = Secret20BalanceQuery::new(&f.ctx, CHAIN, TOKEN, HOLDER).unwrap();
        assert!(query.error().is_some());

        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_good");
        eventually(|| query.error().is_none()).await;

        assert_eq!(query.fetch().await.unwrap().as_deref(), Some("250000"));
        let sent: Vec<_> = f.transport.paths().into_iter().filter(|p| p.contains("/query/")).collect();
        assert_eq!(
            query_msg_of(&sent[0]),
            json!({"balance": {"address": HOLDER, "key": "api_key_good"}})
        );
    }

    #[tokio::test]
    async fn wrong_viewing_key_is_classified() {
        let f = fixture();
        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_stale");
        let query = Secret20BalanceQuery::new(&f.ctx, CHAIN, TOKEN, HOLDER).unwrap();

        let err = query.fetch().await.unwrap_err();
        assert_eq!(
            err,
            QueryError::WrongViewingKey("Wrong viewing key for this address or viewing key not set".into())
        );
        assert_eq!(err.kind(), ErrorKind::Credential);
        assert_eq!(query.phase(), QueryPhase::Failed);
        assert!(query.amount().is_none());

        // Fixing the key recovers on the next fetch.
        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_good");
        assert_eq!(query.fetch().await.unwrap().as_deref(), Some("250000"));
        assert!(query.error().is_none());
    }

    #[tokio::test]
    async fn key_change_drops_the_unsent_request() {
        let f = fixture();
        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_stale");
        let query = Secret20BalanceQuery::new(&f.ctx, CHAIN, TOKEN, HOLDER).unwrap();
        eventually(|| query.phase() == QueryPhase::Ready).await;

        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_good");
        assert_eq!(query.fetch().await.unwrap().as_deref(), Some("250000"));
        assert_eq!(f.session.encrypt_calls(), 2);
        assert_eq!(f.transport.calls_to(&format!("/wasm/contract/{TOKEN}/query/")), 1);
    }

    #[tokio::test]
    async fn empty_address() {
        let f = fixture();
        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_good");
        let query = Secret20BalanceQuery::new(&f.ctx, CHAIN, "", HOLDER).unwrap();
        assert_eq!(query.error(), Some(QueryError::ContractAddressEmpty));

        let query = Secret20BalanceQuery::new(&f.ctx, CHAIN, TOKEN, "").unwrap();
        assert_eq!(query.fetch().await, Err(QueryError::AddressEmpty));
        assert_eq!(f.transport.calls_to(&format!("/wasm/contract/{TOKEN}/query/")), 0);
    }

    #[tokio::test]
    async fn registry_serves_secret20_denominations() {
        let f = fixture();
        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_good");
        let registry: Arc<dyn BalanceRegistry> = Arc::new(Secret20BalanceRegistry::new(f.ctx.clone()));
        let balances = QueryBalances::new(CHAIN, HOLDER, vec![registry]);

        let denom = format!("secret20:{TOKEN}:sscrt");
        let inner = balances.get_balance(&denom).await.unwrap();
        assert!(!inner.balance().ready);

        let balance = inner.fetch().await.unwrap();
        assert_eq!(balance.coin, Coin::new(denom.as_str(), "250000"));
        assert!(!inner.is_fetching());
        assert!(inner.error().is_none());
        assert!(matches!(balances.get_balance("uscrt").await, Err(QueryError::UnknownDenom(_))));
    }

    #[tokio::test]
    async fn registry_reports_code_hash_errors() {
        let f = fixture();
        f.transport.fail(&format!("/wasm/contract/{TOKEN}/code-hash"), QueryError::transport("lcd down"));
        f.ctx.viewing_keys().set_viewing_key(CHAIN, TOKEN, "api_key_good");
        let registry = Secret20BalanceRegistry::new(f.ctx.clone());
        let denom = DenomHelper::parse(&format!("secret20:{TOKEN}:sscrt")).unwrap();
        let inner = registry.get_balance_inner(CHAIN, HOLDER, &denom).await.unwrap().unwrap();

        assert!(inner.fetch().await.is_err());
        assert_eq!(inner.error(), Some(QueryError::transport("lcd down")));
    }
}
