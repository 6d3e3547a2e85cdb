// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyring route messages. None of them approve external senders.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::crypto::Bip44HdPath;
use crate::router::{Message, RouterError};

pub const ROUTE: &str = "keyring";

/// Password or secret received over the wire. Wiped on drop, never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

fn require(secret: &SecretString, what: &str) -> Result<(), RouterError> {
    if secret.is_empty() {
        return Err(RouterError::InvalidMessage(format!("{what} is empty")));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetKeyRingStatusMsg {}

impl Message for GetKeyRingStatusMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "get-keyring-status";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMnemonicKeyMsg {
    pub mnemonic: SecretString,
    pub password: SecretString,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(rename = "bip44HDPath", default)]
    pub bip44_hd_path: Bip44HdPath,
}

impl Message for CreateMnemonicKeyMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "create-mnemonic-key";

    fn validate_basic(&self) -> Result<(), RouterError> {
        require(&self.mnemonic, "Mnemonic")?;
        require(&self.password, "Password")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePrivateKeyMsg {
    pub private_key: SecretString,
    pub password: SecretString,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Message for CreatePrivateKeyMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "create-private-key";

    fn validate_basic(&self) -> Result<(), RouterError> {
        require(&self.private_key, "Private key")?;
        require(&self.password, "Password")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockKeyRingMsg {
    pub password: SecretString,
}

impl Message for UnlockKeyRingMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "unlock-keyring";

    fn validate_basic(&self) -> Result<(), RouterError> {
        require(&self.password, "Password")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockKeyRingMsg {}

impl Message for LockKeyRingMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "lock-keyring";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteKeyRingMsg {
    pub index: usize,
    pub password: SecretString,
}

impl Message for DeleteKeyRingMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "delete-keyring";

    fn validate_basic(&self) -> Result<(), RouterError> {
        require(&self.password, "Password")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeKeyRingPasswordMsg {
    pub old_password: SecretString,
    pub new_password: SecretString,
}

impl Message for ChangeKeyRingPasswordMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "change-keyring-password";

    fn validate_basic(&self) -> Result<(), RouterError> {
        require(&self.old_password, "Old password")?;
        require(&self.new_password, "New password")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetKeyStoreCoinTypeMsg {
    pub chain_id: String,
    pub coin_type: u32,
}

impl Message for SetKeyStoreCoinTypeMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "set-key-store-coin-type";

    fn validate_basic(&self) -> Result<(), RouterError> {
        if self.chain_id.is_empty() {
            return Err(RouterError::InvalidMessage("Chain id is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetMultiKeyStoreInfoMsg {}

impl Message for GetMultiKeyStoreInfoMsg {
    const ROUTE: &'static str = ROUTE;
    const TYPE: &'static str = "get-multi-key-store-info";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secrets_are_not_printed() {
        let msg: UnlockKeyRingMsg = serde_json::from_value(json!({"password": "hunter2"})).unwrap();
        assert_eq!(msg.password.expose(), "hunter2");
        assert!(!format!("{msg:?}").contains("hunter2"));
    }

    #[test]
    fn mnemonic_defaults() {
        let msg: CreateMnemonicKeyMsg = serde_json::from_value(json!({
            "mnemonic": "a b c",
            "password": "pw",
            "bip44HDPath": {"account": 0, "change": 0, "addressIndex": 2}
        }))
        .unwrap();
        assert!(msg.meta.is_empty());
        assert_eq!(msg.bip44_hd_path.address_index, 2);

        let missing_password: CreateMnemonicKeyMsg =
            serde_json::from_value(json!({"mnemonic": "a", "password": ""})).unwrap();
        assert!(missing_password.validate_basic().is_err());
    }
}
