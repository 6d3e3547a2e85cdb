// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Keyring Service
//!
//! Holds the encrypted key stores and, while unlocked, the password and the
//! decrypted secret of the selected store.
//!
//! ## Persistence
//!
//! ```text
//! keyring/key-multi-store     # Vec<KeyStore>
//! keyring/key-store-selected  # Option<usize>
//! ```
//!
//! ## Status
//!
//! - `Empty` - no key store exists
//! - `Locked` - stores exist, no password in memory
//! - `Unlocked` - the selected store is decrypted
//!
//! Every mutating call holds the state write lock from the first read to
//! the last persist.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::crypto::{self, Bip44HdPath, KeyStore, KeyType, ScryptCost};
use super::error::KeyringError;
use super::rng::RandomSource;
use crate::storage::PrefixedStore;

const KEY_MULTI_STORE: &str = "key-multi-store";
const KEY_STORE_SELECTED: &str = "key-store-selected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyringStatus {
    Empty,
    Locked,
    Unlocked,
}

/// Public metadata of one key store. Never carries key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStoreInfo {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub meta: BTreeMap<String, String>,
    #[serde(rename = "bip44HDPath", skip_serializing_if = "Option::is_none")]
    pub bip44_hd_path: Option<Bip44HdPath>,
    pub coin_type_for_chain: BTreeMap<String, u32>,
    pub selected: bool,
}

#[derive(Default)]
struct KeyringState {
    stores: Vec<KeyStore>,
    selected: Option<usize>,
    password: Option<Zeroizing<String>>,
    secret: Option<Zeroizing<Vec<u8>>>,
}

impl KeyringState {
    fn status(&self) -> KeyringStatus {
        if self.stores.is_empty() {
            KeyringStatus::Empty
        } else if self.password.is_some() {
            KeyringStatus::Unlocked
        } else {
            KeyringStatus::Locked
        }
    }

    fn lock(&mut self) {
        self.password = None;
        self.secret = None;
    }
}

pub struct KeyringService {
    store: PrefixedStore,
    rng: Arc<dyn RandomSource>,
    cost: ScryptCost,
    state: RwLock<KeyringState>,
}

impl KeyringService {
    /// Load persisted key stores. The keyring always starts locked.
    pub async fn init(
        store: PrefixedStore,
        rng: Arc<dyn RandomSource>,
        cost: ScryptCost,
    ) -> Result<Self, KeyringError> {
        let stores: Vec<KeyStore> = store.get(KEY_MULTI_STORE).await?.unwrap_or_default();
        let mut selected = store.get::<Option<usize>>(KEY_STORE_SELECTED).await?.flatten();
        if selected.is_some_and(|index| index >= stores.len()) {
            warn!(?selected, stores = stores.len(), "Selected key store out of range, resetting");
            selected = None;
        }
        if selected.is_none() && !stores.is_empty() {
            selected = Some(0);
        }

        debug!(stores = stores.len(), "Loaded key stores");
        Ok(Self {
            store,
            rng,
            cost,
            state: RwLock::new(KeyringState {
                stores,
                selected,
                ..Default::default()
            }),
        })
    }

    pub async fn status(&self) -> KeyringStatus {
        self.state.read().await.status()
    }

    /// Decrypted secret of the selected store: the mnemonic phrase or the
    /// private key hex.
    pub async fn selected_secret(&self) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
        let state = self.state.read().await;
        match (state.status(), &state.secret) {
            (KeyringStatus::Empty, _) => Err(KeyringError::Empty),
            (_, Some(secret)) => Ok(secret.clone()),
            (_, None) => Err(KeyringError::Locked),
        }
    }

    pub async fn create_mnemonic_key(
        &self,
        mnemonic: &str,
        password: &str,
        meta: BTreeMap<String, String>,
        bip44_hd_path: Bip44HdPath,
    ) -> Result<KeyringStatus, KeyringError> {
        let mnemonic = normalize_mnemonic(mnemonic)?;
        self.create_key(KeyType::Mnemonic, &mnemonic, password, meta, Some(bip44_hd_path))
            .await
    }

    pub async fn create_private_key(
        &self,
        private_key: &str,
        password: &str,
        meta: BTreeMap<String, String>,
    ) -> Result<KeyringStatus, KeyringError> {
        let private_key = normalize_private_key(private_key)?;
        self.create_key(KeyType::PrivateKey, &private_key, password, meta, None)
            .await
    }

    async fn create_key(
        &self,
        key_type: KeyType,
        secret: &str,
        password: &str,
        meta: BTreeMap<String, String>,
        bip44_hd_path: Option<Bip44HdPath>,
    ) -> Result<KeyringStatus, KeyringError> {
        if password.is_empty() {
            return Err(KeyringError::EmptyPassword);
        }

        let mut state = self.state.write().await;
        match state.status() {
            KeyringStatus::Empty => {}
            KeyringStatus::Locked => return Err(KeyringError::Locked),
            KeyringStatus::Unlocked => {
                let matches = state
                    .password
                    .as_ref()
                    .is_some_and(|current| bool::from(current.as_bytes().ct_eq(password.as_bytes())));
                if !matches {
                    return Err(KeyringError::PasswordMismatch);
                }
            }
        }

        let key_store =
            crypto::encrypt_with_cost(self.cost, self.rng.as_ref(), key_type, secret, password, meta, bip44_hd_path)
                .await?;

        let mut stores = state.stores.clone();
        stores.push(key_store);
        let selected = Some(stores.len() - 1);
        self.persist(&stores, selected).await?;

        state.stores = stores;
        state.selected = selected;
        state.password = Some(Zeroizing::new(password.to_string()));
        state.secret = Some(Zeroizing::new(secret.as_bytes().to_vec()));

        info!(?key_type, index = ?selected, "Key store created");
        Ok(state.status())
    }

    /// Decrypt the selected store with `password`.
    pub async fn unlock(&self, password: &str) -> Result<KeyringStatus, KeyringError> {
        let mut state = self.state.write().await;
        let index = state.selected.ok_or(KeyringError::Empty)?;
        let key_store = state.stores.get(index).ok_or(KeyringError::Empty)?;

        let secret = crypto::decrypt(key_store, password).await?;
        state.password = Some(Zeroizing::new(password.to_string()));
        state.secret = Some(secret);

        info!(index, "Keyring unlocked");
        Ok(state.status())
    }

    /// Forget the password and the decrypted secret.
    pub async fn lock(&self) -> KeyringStatus {
        let mut state = self.state.write().await;
        state.lock();
        info!("Keyring locked");
        state.status()
    }

    /// Remove the store at `index` after proving the password decrypts it.
    pub async fn delete_key(&self, index: usize, password: &str) -> Result<KeyringStatus, KeyringError> {
        let mut state = self.state.write().await;
        let key_store = state.stores.get(index).ok_or(KeyringError::IndexOutOfRange(index))?;
        crypto::decrypt(key_store, password).await?;

        let mut stores = state.stores.clone();
        stores.remove(index);
        let selected = match state.selected {
            _ if stores.is_empty() => None,
            Some(current) if current > index => Some(current - 1),
            Some(current) if current == index => Some(0),
            other => other,
        };
        self.persist(&stores, selected).await?;

        let selected_deleted = state.selected == Some(index);
        state.stores = stores;
        state.selected = selected;

        if state.stores.is_empty() {
            state.lock();
        } else if selected_deleted && state.password.is_some() {
            // Open the replacement with the password that was just verified.
            let next = selected.and_then(|i| state.stores.get(i)).cloned();
            let reopened = match next {
                Some(next) => crypto::decrypt(&next, password).await.ok(),
                None => None,
            };
            match reopened {
                Some(secret) => state.secret = Some(secret),
                None => state.lock(),
            }
        }

        info!(index, remaining = state.stores.len(), "Key store deleted");
        Ok(state.status())
    }

    /// Re-encrypt every store under `new_password` with fresh salt and IV.
    ///
    /// All stores are decrypted before anything is written, so a wrong old
    /// password changes nothing.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<(), KeyringError> {
        if new_password.is_empty() {
            return Err(KeyringError::EmptyPassword);
        }

        let mut state = self.state.write().await;
        if state.stores.is_empty() {
            return Err(KeyringError::Empty);
        }

        let mut stores = Vec::with_capacity(state.stores.len());
        for key_store in &state.stores {
            let secret = crypto::decrypt(key_store, old_password).await?;
            let text = std::str::from_utf8(&secret)
                .map_err(|_| KeyringError::Crypto(crypto::CryptoError::Validation("secret is not utf-8".into())))?;

            let mut reencrypted = crypto::encrypt_with_cost(
                self.cost,
                self.rng.as_ref(),
                key_store.key_type,
                text,
                new_password,
                key_store.meta.clone(),
                key_store.bip44_hd_path,
            )
            .await?;
            reencrypted.coin_type_for_chain = key_store.coin_type_for_chain.clone();
            stores.push(reencrypted);
        }

        self.persist(&stores, state.selected).await?;
        state.stores = stores;
        if state.password.is_some() {
            state.password = Some(Zeroizing::new(new_password.to_string()));
        }

        info!(stores = state.stores.len(), "Keyring password changed");
        Ok(())
    }

    /// Pin the coin type used for `chain_id` on the selected store. An
    /// existing pin is never overwritten.
    pub async fn set_coin_type(&self, chain_id: &str, coin_type: u32) -> Result<(), KeyringError> {
        let mut state = self.state.write().await;
        let index = state.selected.ok_or(KeyringError::Empty)?;

        let mut stores = state.stores.clone();
        let key_store = stores.get_mut(index).ok_or(KeyringError::Empty)?;
        if key_store.coin_type_for_chain.contains_key(chain_id) {
            return Err(KeyringError::CoinTypeAlreadySet(chain_id.to_string()));
        }
        key_store.coin_type_for_chain.insert(chain_id.to_string(), coin_type);

        self.persist(&stores, state.selected).await?;
        state.stores = stores;

        info!(chain_id, coin_type, index, "Coin type set");
        Ok(())
    }

    pub async fn key_store_infos(&self) -> Vec<KeyStoreInfo> {
        let state = self.state.read().await;
        state
            .stores
            .iter()
            .enumerate()
            .map(|(i, ks)| KeyStoreInfo {
                key_type: ks.key_type,
                meta: ks.meta.clone(),
                bip44_hd_path: ks.bip44_hd_path,
                coin_type_for_chain: ks.coin_type_for_chain.clone(),
                selected: state.selected == Some(i),
            })
            .collect()
    }

    /// Write both keys. If the selection cannot be written, the previous
    /// store list is put back so disk and memory keep agreeing.
    async fn persist(&self, stores: &[KeyStore], selected: Option<usize>) -> Result<(), KeyringError> {
        let previous = self.store.get::<serde_json::Value>(KEY_MULTI_STORE).await?;
        self.store.set(KEY_MULTI_STORE, stores).await?;
        if let Err(err) = self.store.set(KEY_STORE_SELECTED, &selected).await {
            let restored = match &previous {
                Some(value) => self.store.set(KEY_MULTI_STORE, value).await,
                None => self.store.delete(KEY_MULTI_STORE).await,
            };
            if let Err(restore_err) = restored {
                error!(error = %restore_err, "Failed to restore key stores after a partial persist");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

/// Collapse whitespace and lowercase. Accepts 12 to 24 words in steps of 3.
fn normalize_mnemonic(mnemonic: &str) -> Result<String, KeyringError> {
    let words: Vec<String> = mnemonic.split_whitespace().map(str::to_lowercase).collect();
    if words.len() < 12 || words.len() > 24 || words.len() % 3 != 0 {
        return Err(KeyringError::InvalidMnemonic(format!(
            "expected 12 to 24 words in multiples of 3, got {}",
            words.len()
        )));
    }
    Ok(words.join(" "))
}

/// Lowercase hex of a 32-byte key, with an optional `0x` prefix removed.
fn normalize_private_key(private_key: &str) -> Result<String, KeyringError> {
    let trimmed = private_key.trim();
    let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = Zeroizing::new(hex::decode(hex_str).map_err(|e| KeyringError::InvalidPrivateKey(e.to_string()))?);
    if bytes.len() != 32 {
        return Err(KeyringError::InvalidPrivateKey(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(hex::encode(bytes.as_slice()))
}
