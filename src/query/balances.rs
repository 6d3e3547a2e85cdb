// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance Registries
//!
//! A balance is looked up by minimal denomination. Each [`BalanceRegistry`]
//! knows one family of denominations; [`QueryBalances`] asks the registries
//! in order and keeps the first inner query that answers.
//!
//! ```text
//! QueryBalances(chain, address)
//!   get_balance("uscrt")              -> CosmosBalanceRegistry  -> NativeBalance
//!   get_balance("secret20:...:sscrt") -> Secret20BalanceRegistry -> Secret20Balance
//!   get_balance("cw20:...:x")         -> UnknownDenom
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::denom::DenomHelper;
use super::error::QueryError;

/// Raw on-chain amount of one denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }
}

/// A balance and whether it comes from a response. A balance that is not
/// ready reports an amount of zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balance {
    pub coin: Coin,
    pub ready: bool,
}

impl Balance {
    pub fn ready(coin: Coin) -> Self {
        Self { coin, ready: true }
    }

    pub fn pending(denom: impl Into<String>) -> Self {
        Self {
            coin: Coin::new(denom, "0"),
            ready: false,
        }
    }
}

/// Balance of one denomination for one address.
#[async_trait]
pub trait BalanceInner: Send + Sync {
    fn denom(&self) -> &DenomHelper;

    fn is_fetching(&self) -> bool;

    fn error(&self) -> Option<QueryError>;

    fn balance(&self) -> Balance;

    async fn fetch(&self) -> Result<Balance, QueryError>;
}

/// Source of balance queries for a family of denominations.
#[async_trait]
pub trait BalanceRegistry: Send + Sync {
    /// An inner query for `denom`, or `None` if this registry does not serve
    /// the denomination.
    async fn get_balance_inner(
        &self,
        chain_id: &str,
        address: &str,
        denom: &DenomHelper,
    ) -> Result<Option<Arc<dyn BalanceInner>>, QueryError>;
}

/// All balances of one address on one chain.
pub struct QueryBalances {
    chain_id: String,
    address: String,
    registries: Vec<Arc<dyn BalanceRegistry>>,
    inners: Mutex<HashMap<String, Arc<dyn BalanceInner>>>,
}

impl QueryBalances {
    pub fn new(chain_id: &str, address: &str, registries: Vec<Arc<dyn BalanceRegistry>>) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            address: address.to_string(),
            registries,
            inners: Mutex::new(HashMap::new()),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Balance query of `minimal_denom`, shared across calls.
    pub async fn get_balance(&self, minimal_denom: &str) -> Result<Arc<dyn BalanceInner>, QueryError> {
        let mut inners = self.inners.lock().await;
        if let Some(inner) = inners.get(minimal_denom) {
            return Ok(inner.clone());
        }

        let denom = DenomHelper::parse(minimal_denom)?;
        for registry in &self.registries {
            if let Some(inner) = registry
                .get_balance_inner(&self.chain_id, &self.address, &denom)
                .await?
            {
                inners.insert(minimal_denom.to_string(), inner.clone());
                return Ok(inner);
            }
        }

        debug!(chain_id = %self.chain_id, denom = minimal_denom, "No balance registry for denomination");
        Err(QueryError::UnknownDenom(minimal_denom.to_string()))
    }

    /// Every balance looked up so far.
    pub async fn balances(&self) -> Vec<Balance> {
        let inners = self.inners.lock().await;
        let mut balances: Vec<Balance> = inners.values().map(|inner| inner.balance()).collect();
        balances.sort_by(|a, b| a.coin.denom.cmp(&b.coin.denom));
        balances
    }
}

/// Shared [`QueryBalances`] per chain and address.
pub struct BalanceQueries {
    registries: Vec<Arc<dyn BalanceRegistry>>,
    queries: Mutex<HashMap<(String, String), Arc<QueryBalances>>>,
}

impl BalanceQueries {
    pub fn new(registries: Vec<Arc<dyn BalanceRegistry>>) -> Self {
        Self {
            registries,
            queries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_query_address(&self, chain_id: &str, address: &str) -> Arc<QueryBalances> {
        let mut queries = self.queries.lock().await;
        queries
            .entry((chain_id.to_string(), address.to_string()))
            .or_insert_with(|| Arc::new(QueryBalances::new(chain_id, address, self.registries.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedInner {
        denom: DenomHelper,
        amount: &'static str,
    }

    #[async_trait]
    impl BalanceInner for FixedInner {
        fn denom(&self) -> &DenomHelper {
            &self.denom
        }

        fn is_fetching(&self) -> bool {
            false
        }

        fn error(&self) -> Option<QueryError> {
            None
        }

        fn balance(&self) -> Balance {
            Balance::ready(Coin::new(self.denom.minimal_denom(), self.amount))
        }

        async fn fetch(&self) -> Result<Balance, QueryError> {
            Ok(self.balance())
        }
    }

    /// Serves one denomination type and counts lookups.
    struct TypeRegistry {
        type_name: &'static str,
        amount: &'static str,
        lookups: AtomicUsize,
    }

    impl TypeRegistry {
        fn new(type_name: &'static str, amount: &'static str) -> Arc<Self> {
            Arc::new(Self {
                type_name,
                amount,
                lookups: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BalanceRegistry for TypeRegistry {
        async fn get_balance_inner(
            &self,
            _chain_id: &str,
            _address: &str,
            denom: &DenomHelper,
        ) -> Result<Option<Arc<dyn BalanceInner>>, QueryError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if denom.type_name() != self.type_name {
                return Ok(None);
            }
            Ok(Some(Arc::new(FixedInner {
                denom: denom.clone(),
                amount: self.amount,
            })))
        }
    }

    #[tokio::test]
    async fn first_matching_registry_wins() {
        let native = TypeRegistry::new("native", "1");
        let shadow = TypeRegistry::new("native", "2");
        let balances = QueryBalances::new("secret-4", "secret1a", vec![
            native.clone() as Arc<dyn BalanceRegistry>,
            shadow.clone() as Arc<dyn BalanceRegistry>,
        ]);

        let inner = balances.get_balance("uscrt").await.unwrap();
        assert_eq!(inner.balance().coin, Coin::new("uscrt", "1"));
        assert_eq!(shadow.lookups.load(Ordering::SeqCst), 0);

        // Shared on the second lookup.
        balances.get_balance("uscrt").await.unwrap();
        assert_eq!(native.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(balances.balances().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_and_invalid_denominations() {
        let balances = QueryBalances::new("secret-4", "secret1a", vec![TypeRegistry::new("native", "1") as Arc<dyn BalanceRegistry>]);
        assert!(matches!(
            balances.get_balance("cw20:juno1abc:token").await,
            Err(QueryError::UnknownDenom(_))
        ));
        assert!(matches!(balances.get_balance("a:b").await, Err(QueryError::InvalidDenom(_))));
    }

    #[tokio::test]
    async fn queries_are_shared_per_address() {
        let queries = BalanceQueries::new(vec![]);
        let a = queries.get_query_address("secret-4", "secret1a").await;
        let b = queries.get_query_address("secret-4", "secret1a").await;
        let c = queries.get_query_address("secret-4", "secret1b").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(c.address(), "secret1b");
    }

    #[test]
    fn pending_balance_is_zero() {
        let balance = Balance::pending("uscrt");
        assert!(!balance.ready);
        assert_eq!(balance.coin.amount, "0");
    }
}
