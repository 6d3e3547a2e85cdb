// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Composition root.
//!
//! Exactly one [`Router`], one [`KeyringService`] and one
//! [`PermissionService`] exist per process. They are built here and shared
//! through [`AppState`].

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use crate::config::AppConfig;
use crate::keyring::{self, KeyringError, KeyringService, OsRandom, ScryptCost};
use crate::permission::{self, PermissionError, PermissionService};
use crate::query::{
    BalanceQueries, BalanceRegistry, CosmosBalanceRegistry, HttpTransport, QueryCache, QueryContext, QueryError,
    Secret20BalanceRegistry, WireFormat,
};
use crate::router::{check_message_is_internal, check_origin_is_valid, ExtensionEnvProducer, Router, RouterError};
use crate::storage::{FileKvStore, KvStore, PrefixedStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Failed to open storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to load keyring: {0}")]
    Keyring(#[from] KeyringError),

    #[error("Failed to load permissions: {0}")]
    Permission(#[from] PermissionError),

    #[error("Failed to register routes: {0}")]
    Router(#[from] RouterError),

    #[error("Failed to configure queries: {0}")]
    Query(#[from] QueryError),
}

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub keyring: Arc<KeyringService>,
    pub permissions: Arc<PermissionService>,
    pub queries: Arc<QueryContext>,
    pub balances: Arc<BalanceQueries>,
    pub storage: Arc<dyn KvStore>,
    /// Bearer token required on `/v1/message`.
    pub bridge_token: Arc<str>,
}

impl AppState {
    /// Open the file store under `config.data_dir` and build every service.
    pub async fn from_config(config: &AppConfig) -> Result<Self, InitError> {
        let storage: Arc<dyn KvStore> = Arc::new(FileKvStore::open(&config.data_dir)?);
        let transport = Arc::new(HttpTransport::new(config.lcd_url.clone())?);
        let mut config = config.clone();
        if config.bridge_token.is_none() {
            let path = config.bridge_token_path();
            config.bridge_token = Some(load_or_create_bridge_token(&path)?);
            info!(path = %path.display(), "Bridge token loaded");
        }
        let state = Self::build(&config, storage, ScryptCost::default()).await?;
        state.queries.add_chain(&config.chain_id, transport, WireFormat::default());
        Ok(state)
    }

    /// Build every service over `storage`. No chain is configured for queries.
    ///
    /// Without a configured bridge token a random one is used, so the bridge
    /// is never open.
    pub async fn build(config: &AppConfig, storage: Arc<dyn KvStore>, cost: ScryptCost) -> Result<Self, InitError> {
        let keyring = Arc::new(
            KeyringService::init(
                PrefixedStore::new(storage.clone(), "keyring"),
                Arc::new(OsRandom),
                cost,
            )
            .await?,
        );
        let permissions = Arc::new(PermissionService::init(PrefixedStore::new(storage.clone(), "permission")).await?);

        let mut router = Router::new(Arc::new(ExtensionEnvProducer::new(
            config.extension_id.clone(),
            config.extension_origin.clone(),
        )));
        router.add_guard(check_origin_is_valid);
        router.add_guard(check_message_is_internal);
        keyring::init(&mut router, keyring.clone())?;
        permission::init(&mut router, permissions.clone())?;

        let queries = Arc::new(QueryContext::new(storage.clone(), Arc::new(QueryCache::default())));
        let registries: Vec<Arc<dyn BalanceRegistry>> = vec![
            Arc::new(CosmosBalanceRegistry::new(queries.clone())),
            Arc::new(Secret20BalanceRegistry::new(queries.clone())),
        ];
        let balances = Arc::new(BalanceQueries::new(registries));
        let bridge_token: Arc<str> = match &config.bridge_token {
            Some(token) => Arc::from(token.as_str()),
            None => Arc::from(generate_token()),
        };

        info!(
            extension_id = %config.extension_id,
            chain_id = %config.chain_id,
            "Wallet core initialized"
        );
        Ok(Self {
            router: Arc::new(router),
            keyring,
            permissions,
            queries,
            balances,
            storage,
            bridge_token,
        })
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Read the token file, or create it with a fresh token readable only by
/// the owner.
fn load_or_create_bridge_token(path: &Path) -> Result<String, StorageError> {
    match fs::read_to_string(path) {
        Ok(existing) if !existing.trim().is_empty() => return Ok(existing.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let token = generate_token();
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(token.as_bytes())?;
    file.flush()?;
    Ok(token)
}


#[cfg(test)]
mod tests {
    use super::test_support::{test_cost, test_state};
    use super::*;
    use crate::storage::MemoryKvStore;
    use crate::keyring::KeyringStatus;
    use crate::router::RawContext;
    use crate::router::RoutedMessage;
    use serde_json::json;

    #[tokio::test]
    async fn routes_are_wired() {
        let state = test_state().await;
        let ctx = RawContext::new("wallet-core", "chrome-extension://wallet-core/popup.html");
        let routed = RoutedMessage {
            route: "keyring".into(),
            msg_type: "get-keyring-status".into(),
            origin: "chrome-extension://wallet-core".into(),
            msg: json!({}),
        };

        let result = state.router.dispatch(&ctx, routed).await.unwrap();
        assert_eq!(result, json!({"status": KeyringStatus::Empty}));
    }

    #[test]
    fn bridge_token_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge-token");

        let first = load_or_create_bridge_token(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(load_or_create_bridge_token(&path).unwrap(), first);

        fs::write(&path, "  pinned\n").unwrap();
        assert_eq!(load_or_create_bridge_token(&path).unwrap(), "pinned");
    }

    #[tokio::test]
    async fn unset_bridge_token_is_random() {
        let build = || async {
            AppState::build(&AppConfig::default(), Arc::new(MemoryKvStore::new()), test_cost())
                .await
                .unwrap()
        };
        let a = build().await;
        let b = build().await;
        assert!(!a.bridge_token.is_empty());
        assert_ne!(a.bridge_token, b.bridge_token);
    }

    #[tokio::test]
    async fn balances_are_served_for_configured_chains() {
        let state = test_state().await;
        let balances = state.balances.get_query_address("secret-4", "secret1a").await;
        // No chain is configured by `build`.
        assert!(matches!(
            balances.get_balance("uscrt").await,
            Err(QueryError::UnknownChain(_))
        ));
    }
}
