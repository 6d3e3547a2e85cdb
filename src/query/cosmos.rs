// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Native bank balances.
//!
//! One `GET /bank/balances/{address}` answers every native denomination of
//! an address, so the query is shared per chain and address and each
//! [`NativeBalance`] reads its own denomination out of it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::balances::{Balance, BalanceInner, BalanceRegistry, Coin};
use super::chain_query::{ChainQuery, ResultEnvelope};
use super::context::QueryContext;
use super::denom::{DenomHelper, DenomKind};
use super::error::QueryError;

pub type CosmosBalances = ChainQuery<ResultEnvelope<Vec<Coin>>>;

fn cosmos_balances(ctx: &QueryContext, chain_id: &str, address: &str) -> Result<CosmosBalances, QueryError> {
    let transport = ctx.transport(chain_id)?;
    let url = format!("/bank/balances/{address}");
    let query = if address.is_empty() {
        CosmosBalances::blocked(transport, url, QueryError::AddressEmpty)
    } else {
        CosmosBalances::new(transport, url)
    };
    Ok(query.with_cache(ctx.cache().clone()))
}

/// One native denomination read out of the shared balances query.
pub struct NativeBalance {
    denom: DenomHelper,
    balances: Arc<CosmosBalances>,
}

impl NativeBalance {
    fn find(&self, coins: &[Coin]) -> Coin {
        coins
            .iter()
            .find(|coin| coin.denom == self.denom.denom())
            .cloned()
            .unwrap_or_else(|| Coin::new(self.denom.denom(), "0"))
    }
}

#[async_trait]
impl BalanceInner for NativeBalance {
    fn denom(&self) -> &DenomHelper {
        &self.denom
    }

    fn is_fetching(&self) -> bool {
        self.balances.is_fetching()
    }

    fn error(&self) -> Option<QueryError> {
        self.balances.error()
    }

    fn balance(&self) -> Balance {
        match self.balances.response() {
            Some(response) => Balance::ready(self.find(&response.data.result)),
            None => Balance::pending(self.denom.denom()),
        }
    }

    async fn fetch(&self) -> Result<Balance, QueryError> {
        let response = self.balances.fetch().await?;
        Ok(Balance::ready(self.find(&response.data.result)))
    }
}

/// Serves native denominations.
pub struct CosmosBalanceRegistry {
    ctx: Arc<QueryContext>,
    balances: Mutex<HashMap<String, Arc<CosmosBalances>>>,
}

impl CosmosBalanceRegistry {
    pub fn new(ctx: Arc<QueryContext>) -> Self {
        Self {
            ctx,
            balances: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BalanceRegistry for CosmosBalanceRegistry {
    async fn get_balance_inner(
        &self,
        chain_id: &str,
        address: &str,
        denom: &DenomHelper,
    ) -> Result<Option<Arc<dyn BalanceInner>>, QueryError> {
        if denom.kind() != &DenomKind::Native {
            return Ok(None);
        }

        let key = format!("{chain_id}/{address}");
        let mut balances = self.balances.lock().await;
        let shared = match balances.get(&key) {
            Some(query) => query.clone(),
            None => {
                let query = Arc::new(cosmos_balances(&self.ctx, chain_id, address)?);
                balances.insert(key, query.clone());
                query
            }
        };

        Ok(Some(Arc::new(NativeBalance {
            denom: denom.clone(),
            balances: shared,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::balances::QueryBalances;
    use crate::query::cache::QueryCache;
    use crate::query::secret_contract::WireFormat;
    use crate::query::testing::MockTransport;
    use crate::storage::MemoryKvStore;
    use serde_json::json;

    const ADDRESS: &str = "secret1ap26qrlp8mcq2pg6r47w43l0y8zkqm8a450s03";

    fn setup() -> (Arc<MockTransport>, QueryBalances) {
        let transport = MockTransport::new();
        transport.respond(
            &format!("/bank/balances/{ADDRESS}"),
            json!({"height": "42", "result": [
                {"denom": "uscrt", "amount": "1500000"},
                {"denom": "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2", "amount": "3"}
            ]}),
        );
        let ctx = Arc::new(QueryContext::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(QueryCache::default()),
        ));
        ctx.add_chain("secret-4", transport.clone(), WireFormat::default());
        let registry: Arc<dyn BalanceRegistry> = Arc::new(CosmosBalanceRegistry::new(ctx));
        (transport, QueryBalances::new("secret-4", ADDRESS, vec![registry]))
    }

    #[tokio::test]
    async fn native_denominations_share_one_request() {
        let (transport, balances) = setup();
        let uscrt = balances.get_balance("uscrt").await.unwrap();
        let missing = balances.get_balance("uatom").await.unwrap();
        assert!(!uscrt.balance().ready);

        assert_eq!(uscrt.fetch().await.unwrap().coin, Coin::new("uscrt", "1500000"));
        assert_eq!(transport.calls(), 1);

        // Same query object, already resolved.
        let balance = missing.balance();
        assert!(balance.ready);
        assert_eq!(balance.coin, Coin::new("uatom", "0"));
    }

    #[tokio::test]
    async fn secret20_is_not_served() {
        let (_, balances) = setup();
        assert!(matches!(
            balances.get_balance("secret20:secret1xyz:sscrt").await,
            Err(QueryError::UnknownDenom(_))
        ));
    }

    #[tokio::test]
    async fn empty_address_never_fetches() {
        let (transport, _) = setup();
        let ctx = Arc::new(QueryContext::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(QueryCache::default()),
        ));
        ctx.add_chain("secret-4", transport.clone(), WireFormat::default());
        let balances = QueryBalances::new("secret-4", "", vec![Arc::new(CosmosBalanceRegistry::new(ctx)) as Arc<dyn BalanceRegistry>]);

        let inner = balances.get_balance("uscrt").await.unwrap();
        assert_eq!(inner.error(), Some(QueryError::AddressEmpty));
        assert_eq!(inner.error().unwrap().to_string(), "Address is empty");
        assert_eq!(inner.fetch().await, Err(QueryError::AddressEmpty));
        assert_eq!(transport.calls(), 0);
    }
}
