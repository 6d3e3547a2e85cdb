// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Vault
//!
//! - [`crypto`] - password-based encryption of mnemonics and private keys
//! - [`rng`] - injectable random source for salts and IVs
//! - [`service`] - the [`KeyringService`] holding the encrypted stores
//! - [`messages`] / [`handler`] - the `keyring` router route

pub mod crypto;
pub mod error;
pub mod handler;
pub mod messages;
pub mod rng;
pub mod service;

use std::sync::Arc;

pub use crypto::{decrypt, encrypt, encrypt_with_cost, CryptoError, KeyStore, KeyType, ScryptCost};
pub use error::KeyringError;
pub use handler::{KeyringHandler, KeyringMessage};
pub use messages::ROUTE;
pub use rng::{FixedRandom, OsRandom, RandomSource};
pub use service::{KeyStoreInfo, KeyringService, KeyringStatus};

use crate::router::{Router, RouterError};

/// Register every keyring message and the keyring handler on `router`.
pub fn init(router: &mut Router, service: Arc<KeyringService>) -> Result<(), RouterError> {
    router.register_message::<messages::GetKeyRingStatusMsg>()?;
    router.register_message::<messages::CreateMnemonicKeyMsg>()?;
    router.register_message::<messages::CreatePrivateKeyMsg>()?;
    router.register_message::<messages::UnlockKeyRingMsg>()?;
    router.register_message::<messages::LockKeyRingMsg>()?;
    router.register_message::<messages::DeleteKeyRingMsg>()?;
    router.register_message::<messages::ChangeKeyRingPasswordMsg>()?;
    router.register_message::<messages::SetKeyStoreCoinTypeMsg>()?;
    router.register_message::<messages::GetMultiKeyStoreInfoMsg>()?;
    router.add_handler(ROUTE, Arc::new(KeyringHandler::new(service)))
}
