// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Keyring route handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::messages::*;
use super::service::KeyringService;
use crate::router::{to_value, AnyMessage, Env, Handler, Message, RouterError};

/// Every message the keyring route accepts.
#[derive(Debug)]
pub enum KeyringMessage {
    GetStatus(GetKeyRingStatusMsg),
    CreateMnemonicKey(CreateMnemonicKeyMsg),
    CreatePrivateKey(CreatePrivateKeyMsg),
    Unlock(UnlockKeyRingMsg),
    Lock(LockKeyRingMsg),
    Delete(DeleteKeyRingMsg),
    ChangePassword(ChangeKeyRingPasswordMsg),
    SetCoinType(SetKeyStoreCoinTypeMsg),
    GetMultiKeyStoreInfo(GetMultiKeyStoreInfoMsg),
}

/// Try each concrete type in turn, returning the variant on the first match.
macro_rules! downcast_chain {
    ($msg:expr, $($variant:ident => $ty:ty),+ $(,)?) => {{
        let msg = $msg;
        $(
            let msg = match msg.downcast::<$ty>() {
                Ok(msg) => return Ok(Self::$variant(msg)),
                Err(msg) => msg,
            };
        )+
        Err(RouterError::UnknownMessageType(msg.msg_type().to_string()))
    }};
}

impl TryFrom<AnyMessage> for KeyringMessage {
    type Error = RouterError;

    fn try_from(msg: AnyMessage) -> Result<Self, Self::Error> {
        downcast_chain!(msg,
            GetStatus => GetKeyRingStatusMsg,
            CreateMnemonicKey => CreateMnemonicKeyMsg,
            CreatePrivateKey => CreatePrivateKeyMsg,
            Unlock => UnlockKeyRingMsg,
            Lock => LockKeyRingMsg,
            Delete => DeleteKeyRingMsg,
            ChangePassword => ChangeKeyRingPasswordMsg,
            SetCoinType => SetKeyStoreCoinTypeMsg,
            GetMultiKeyStoreInfo => GetMultiKeyStoreInfoMsg,
        )
    }
}

pub struct KeyringHandler {
    service: Arc<KeyringService>,
}

impl KeyringHandler {
    pub fn new(service: Arc<KeyringService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for KeyringHandler {
    fn message_types(&self) -> &'static [&'static str] {
        &[
            GetKeyRingStatusMsg::TYPE,
            CreateMnemonicKeyMsg::TYPE,
            CreatePrivateKeyMsg::TYPE,
            UnlockKeyRingMsg::TYPE,
            LockKeyRingMsg::TYPE,
            DeleteKeyRingMsg::TYPE,
            ChangeKeyRingPasswordMsg::TYPE,
            SetKeyStoreCoinTypeMsg::TYPE,
            GetMultiKeyStoreInfoMsg::TYPE,
        ]
    }

    async fn handle(&self, _env: &Env, msg: AnyMessage) -> Result<Value, RouterError> {
        let service = &self.service;
        match KeyringMessage::try_from(msg)? {
            KeyringMessage::GetStatus(_) => Ok(json!({ "status": service.status().await })),
            KeyringMessage::CreateMnemonicKey(msg) => {
                let status = service
                    .create_mnemonic_key(
                        msg.mnemonic.expose(),
                        msg.password.expose(),
                        msg.meta.clone(),
                        msg.bip44_hd_path,
                    )
                    .await?;
                Ok(json!({ "status": status }))
            }
            KeyringMessage::CreatePrivateKey(msg) => {
                let status = service
                    .create_private_key(msg.private_key.expose(), msg.password.expose(), msg.meta.clone())
                    .await?;
                Ok(json!({ "status": status }))
            }
            KeyringMessage::Unlock(msg) => {
                let status = service.unlock(msg.password.expose()).await?;
                Ok(json!({ "status": status }))
            }
            KeyringMessage::Lock(_) => Ok(json!({ "status": service.lock().await })),
            KeyringMessage::Delete(msg) => {
                let status = service.delete_key(msg.index, msg.password.expose()).await?;
                Ok(json!({ "status": status }))
            }
            KeyringMessage::ChangePassword(msg) => {
                service
                    .change_password(msg.old_password.expose(), msg.new_password.expose())
                    .await?;
                Ok(Value::Null)
            }
            KeyringMessage::SetCoinType(msg) => {
                service.set_coin_type(&msg.chain_id, msg.coin_type).await?;
                Ok(Value::Null)
            }
            KeyringMessage::GetMultiKeyStoreInfo(_) => to_value(service.key_store_infos().await),
        }
    }
}
