// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain Queries
//!
//! Observable queries against the chain REST endpoint, including encrypted
//! queries to confidential contracts.
//!
//! ## Module Structure
//!
//! ```text
//! query/
//! ├── transport.rs       # Transport trait, reqwest implementation
//! ├── observable.rs      # Subject / Subscription
//! ├── cache.rs           # shared LRU + TTL response cache
//! ├── chain_query.rs     # QueryCell, plain GET queries
//! ├── code_hash.rs       # persisted contract code hashes
//! ├── session.rs         # per-chain encryption sessions
//! ├── secret_contract.rs # encrypted contract query lifecycle
//! ├── secret20.rs        # viewing keys, token balances
//! ├── denom.rs           # minimal denomination parsing
//! ├── balances.rs        # balance registries
//! ├── cosmos.rs          # native bank balances
//! └── context.rs         # per-chain configuration
//! ```

pub mod balances;
pub mod cache;
pub mod chain_query;
pub mod code_hash;
pub mod context;
pub mod cosmos;
pub mod denom;
pub mod error;
pub mod observable;
pub mod secret20;
pub mod secret_contract;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use balances::{Balance, BalanceInner, BalanceQueries, BalanceRegistry, Coin, QueryBalances};
pub use cache::{CachedResponse, QueryCache};
pub use chain_query::{ChainQuery, QueryCell, QueryResponse, QueryState, ResultEnvelope};
pub use code_hash::ContractCodeHashCache;
pub use context::QueryContext;
pub use cosmos::CosmosBalanceRegistry;
pub use denom::{DenomHelper, DenomKind};
pub use error::QueryError;
pub use observable::{Subject, Subscription};
pub use secret20::{Secret20BalanceQuery, Secret20BalanceRegistry, ViewingKeyStore};
pub use secret_contract::{QueryPhase, SecretContractQuery, WireFormat};
pub use session::{EncryptionSessions, EncryptionUtils};
pub use transport::{HttpTransport, Transport, TransportResponse};
