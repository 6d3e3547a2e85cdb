// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyring errors.

use super::crypto::CryptoError;
use crate::error::ErrorKind;
use crate::router::RouterError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum KeyringError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Failed to persist key stores: {0}")]
    Storage(#[from] StorageError),

    #[error("Key store is empty")]
    Empty,

    #[error("Keyring is locked")]
    Locked,

    /// A new key was offered with a password other than the unlocked one.
    #[error("Password does not match the unlocked keyring")]
    PasswordMismatch,

    #[error("Key store index {0} is out of range")]
    IndexOutOfRange(usize),

    #[error("Coin type is already set for chain {0}")]
    CoinTypeAlreadySet(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Password is empty")]
    EmptyPassword,
}

impl KeyringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyringError::Crypto(e) => e.kind(),
            KeyringError::Storage(_) => ErrorKind::Storage,
            KeyringError::Empty | KeyringError::Locked | KeyringError::CoinTypeAlreadySet(_) => {
                ErrorKind::Precondition
            }
            KeyringError::PasswordMismatch => ErrorKind::Integrity,
            KeyringError::IndexOutOfRange(_)
            | KeyringError::InvalidMnemonic(_)
            | KeyringError::InvalidPrivateKey(_)
            | KeyringError::EmptyPassword => ErrorKind::Validation,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            KeyringError::Crypto(CryptoError::Integrity) => "unmatched_mac",
            KeyringError::Crypto(CryptoError::Validation(_)) => "invalid_key_store",
            KeyringError::Crypto(_) => "crypto_error",
            KeyringError::Storage(_) => "storage_error",
            KeyringError::Empty => "key_store_empty",
            KeyringError::Locked => "keyring_locked",
            KeyringError::PasswordMismatch => "password_mismatch",
            KeyringError::IndexOutOfRange(_) => "index_out_of_range",
            KeyringError::CoinTypeAlreadySet(_) => "coin_type_already_set",
            KeyringError::InvalidMnemonic(_) => "invalid_mnemonic",
            KeyringError::InvalidPrivateKey(_) => "invalid_private_key",
            KeyringError::EmptyPassword => "empty_password",
        }
    }
}

impl From<KeyringError> for RouterError {
    fn from(err: KeyringError) -> Self {
        RouterError::Handler {
            kind: err.kind(),
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}
