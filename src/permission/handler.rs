// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission route handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::messages::{GetPermissionOriginsMsg, RemovePermissionOriginMsg};
use super::service::PermissionService;
use crate::router::{to_value, AnyMessage, Env, Handler, Message, RouterError};

/// Every message the permission route accepts.
#[derive(Debug)]
pub enum PermissionMessage {
    GetPermissionOrigins(GetPermissionOriginsMsg),
    RemovePermissionOrigin(RemovePermissionOriginMsg),
}

impl TryFrom<AnyMessage> for PermissionMessage {
    type Error = RouterError;

    fn try_from(msg: AnyMessage) -> Result<Self, Self::Error> {
        let msg = match msg.downcast::<GetPermissionOriginsMsg>() {
            Ok(msg) => return Ok(Self::GetPermissionOrigins(msg)),
            Err(msg) => msg,
        };
        match msg.downcast::<RemovePermissionOriginMsg>() {
            Ok(msg) => Ok(Self::RemovePermissionOrigin(msg)),
            Err(msg) => Err(RouterError::UnknownMessageType(msg.msg_type().to_string())),
        }
    }
}

pub struct PermissionHandler {
    service: Arc<PermissionService>,
}

impl PermissionHandler {
    pub fn new(service: Arc<PermissionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for PermissionHandler {
    fn message_types(&self) -> &'static [&'static str] {
        &[GetPermissionOriginsMsg::TYPE, RemovePermissionOriginMsg::TYPE]
    }

    async fn handle(&self, _env: &Env, msg: AnyMessage) -> Result<Value, RouterError> {
        match PermissionMessage::try_from(msg)? {
            PermissionMessage::GetPermissionOrigins(msg) => {
                to_value(self.service.get_permission_origins(&msg.permission_type).await)
            }
            PermissionMessage::RemovePermissionOrigin(msg) => {
                self.service
                    .remove_permission(&msg.permission_type, &[msg.permission_origin])
                    .await?;
                Ok(Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission;
    use crate::router::{
        check_message_is_internal, check_origin_is_valid, ExtensionEnvProducer, RawContext, RoutedMessage, Router,
        PERMISSION_REJECTED,
    };
    use crate::storage::{MemoryKvStore, PrefixedStore};
    use serde_json::json;

    const EXT_ORIGIN: &str = "chrome-extension://wallet";

    async fn setup() -> (Router, Arc<PermissionService>) {
        let store = PrefixedStore::new(Arc::new(MemoryKvStore::new()), "permission");
        let service = Arc::new(PermissionService::init(store).await.unwrap());
        service
            .add_permission("basic-access", &["https://a.example".to_string()])
            .await
            .unwrap();

        let mut router = Router::new(Arc::new(ExtensionEnvProducer::new("wallet", EXT_ORIGIN)));
        permission::init(&mut router, service.clone()).unwrap();
        router.add_guard(check_origin_is_valid);
        router.add_guard(check_message_is_internal);
        (router, service)
    }

    fn internal() -> RawContext {
        RawContext::new("wallet", "chrome-extension://wallet/popup.html")
    }

    #[tokio::test]
    async fn get_and_remove_through_router() {
        let (router, service) = setup().await;

        let get = RoutedMessage::new(
            EXT_ORIGIN,
            &GetPermissionOriginsMsg {
                permission_type: "basic-access".into(),
            },
        )
        .unwrap();
        let response = router.handle(&internal(), get.clone()).await;
        assert_eq!(response.result, Some(json!(["https://a.example"])));

        let remove = RoutedMessage::new(
            EXT_ORIGIN,
            &RemovePermissionOriginMsg {
                permission_type: "basic-access".into(),
                permission_origin: "https://a.example".into(),
            },
        )
        .unwrap();
        assert!(router.handle(&internal(), remove).await.is_success());
        assert!(service.get_permission_origins("basic-access").await.is_empty());
    }

    #[tokio::test]
    async fn dapp_cannot_revoke() {
        let (router, service) = setup().await;
        let ctx = RawContext::new("other", "https://a.example/");
        let remove = RoutedMessage::new(
            "https://a.example",
            &RemovePermissionOriginMsg {
                permission_type: "basic-access".into(),
                permission_origin: "https://a.example".into(),
            },
        )
        .unwrap();

        let response = router.handle(&ctx, remove).await;
        assert_eq!(response.error.unwrap().message, PERMISSION_REJECTED);
        assert!(service.has_permission("basic-access", "https://a.example").await);
    }
}
