// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Router
//!
//! Routes a [`RoutedMessage`] from an untrusted context to the handler of its
//! route. Every dispatch goes through the same pipeline:
//!
//! 1. Decode against the registered message type and run `validate_basic`
//! 2. Produce the caller [`Env`] from the raw transport context
//! 3. Run every guard in registration order; the first failure wins
//! 4. Look up the route's handler and await it
//!
//! Registration is checked both ways: a message type registered on a route
//! must appear in that route's [`Handler::message_types`], whichever of the
//! two is registered first.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::env::{Env, EnvProducer, RawContext};
use super::error::RouterError;
use super::guards::Guard;
use super::handler::Handler;
use super::message::{AnyMessage, Message, RoutedMessage, RouterResponse, WireError};
use crate::error::ErrorKind;

/// Generic denial shown to callers outside the extension.
pub const PERMISSION_REJECTED: &str = "Permission rejected";

type Decoder = Box<dyn Fn(&str, Value) -> Result<AnyMessage, RouterError> + Send + Sync>;

fn decode<M: Message>(origin: &str, msg: Value) -> Result<AnyMessage, RouterError> {
    let msg: M = serde_json::from_value(msg).map_err(|e| RouterError::InvalidMessage(e.to_string()))?;
    msg.validate_basic()?;
    Ok(AnyMessage::from_message(origin, msg))
}

/// Message router with a guard pipeline.
pub struct Router {
    env_producer: Arc<dyn EnvProducer>,
    messages: HashMap<&'static str, HashMap<&'static str, Decoder>>,
    guards: Vec<Guard>,
    handlers: HashMap<&'static str, Arc<dyn Handler>>,
}

impl Router {
    pub fn new(env_producer: Arc<dyn EnvProducer>) -> Self {
        Self {
            env_producer,
            messages: HashMap::new(),
            guards: Vec::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a message type so it can be decoded from the wire.
    pub fn register_message<M: Message>(&mut self) -> Result<(), RouterError> {
        let route = self.messages.entry(M::ROUTE).or_default();
        if route.contains_key(M::TYPE) {
            return Err(RouterError::DuplicateMessage {
                route: M::ROUTE,
                msg_type: M::TYPE,
            });
        }

        if let Some(handler) = self.handlers.get(M::ROUTE) {
            if !handler.message_types().contains(&M::TYPE) {
                return Err(RouterError::UnhandledMessageType {
                    route: M::ROUTE,
                    msg_type: M::TYPE,
                });
            }
        }

        route.insert(M::TYPE, Box::new(decode::<M>));
        debug!(route = M::ROUTE, msg_type = M::TYPE, "Registered message");
        Ok(())
    }

    /// Append a guard. Guards run in the order they were added.
    pub fn add_guard<F>(&mut self, guard: F)
    where
        F: Fn(&Env, &AnyMessage) -> Result<(), RouterError> + Send + Sync + 'static,
    {
        self.guards.push(Arc::new(guard));
    }

    /// Install the handler of a route. One handler per route.
    pub fn add_handler(&mut self, route: &'static str, handler: Arc<dyn Handler>) -> Result<(), RouterError> {
        if self.handlers.contains_key(route) {
            return Err(RouterError::DuplicateHandler(route));
        }

        if let Some(registered) = self.messages.get(route) {
            let handled = handler.message_types();
            if let Some(missing) = registered.keys().copied().find(|t| !handled.contains(t)) {
                return Err(RouterError::UnhandledMessageType {
                    route,
                    msg_type: missing,
                });
            }
        }

        self.handlers.insert(route, handler);
        debug!(route, "Registered handler");
        Ok(())
    }

    /// Run the full pipeline and return the handler's result unmodified.
    pub async fn dispatch(&self, ctx: &RawContext, routed: RoutedMessage) -> Result<Value, RouterError> {
        self.run(ctx, routed).await.1
    }

    /// Wire entry point: always answers with a tagged response.
    ///
    /// Authorization failures seen by a non-internal caller carry only
    /// [`PERMISSION_REJECTED`]; the full reason goes to the log.
    pub async fn handle(&self, ctx: &RawContext, routed: RoutedMessage) -> RouterResponse {
        let route = routed.route.clone();
        let msg_type = routed.msg_type.clone();

        let (env, result) = self.run(ctx, routed).await;
        match result {
            Ok(value) => RouterResponse::success(value),
            Err(err) if err.kind() == ErrorKind::Authorization => {
                warn!(
                    route = %route,
                    msg_type = %msg_type,
                    sender_url = %ctx.sender_url,
                    reason = %err,
                    "Message rejected"
                );
                let internal = env.as_ref().is_some_and(|env| env.is_internal);
                if internal {
                    RouterResponse::failure(&err)
                } else {
                    RouterResponse {
                        result: None,
                        error: Some(WireError {
                            message: PERMISSION_REJECTED.to_string(),
                            kind: ErrorKind::Authorization,
                            code: err.error_code().to_string(),
                        }),
                    }
                }
            }
            Err(err) => {
                debug!(route = %route, msg_type = %msg_type, error = %err, "Message failed");
                RouterResponse::failure(&err)
            }
        }
    }

    async fn run(
        &self,
        ctx: &RawContext,
        routed: RoutedMessage,
    ) -> (Option<Env>, Result<Value, RouterError>) {
        let decoder = match self
            .messages
            .get(routed.route.as_str())
            .and_then(|types| types.get(routed.msg_type.as_str()))
        {
            Some(decoder) => decoder,
            None => {
                return (
                    None,
                    Err(RouterError::UnregisteredMessage {
                        route: routed.route,
                        msg_type: routed.msg_type,
                    }),
                )
            }
        };

        let msg = match decoder(&routed.origin, routed.msg) {
            Ok(msg) => msg,
            Err(err) => return (None, Err(err)),
        };

        let env = match self.env_producer.produce_env(ctx) {
            Ok(env) => env,
            Err(err) => return (None, Err(err)),
        };

        for guard in &self.guards {
            if let Err(err) = guard(&env, &msg) {
                return (Some(env), Err(err));
            }
        }

        let Some(handler) = self.handlers.get(msg.route()) else {
            let route = msg.route().to_string();
            return (Some(env), Err(RouterError::NoHandler(route)));
        };

        debug!(
            request_id = %env.request_id,
            route = msg.route(),
            msg_type = msg.msg_type(),
            "Dispatching message"
        );
        let result = handler.handle(&env, msg).await;
        (Some(env), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::env::ExtensionEnvProducer;
    use crate::router::guards::{check_message_is_internal, check_origin_is_valid};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EXT_ORIGIN: &str = "chrome-extension://ext-id";

    #[derive(Debug, Serialize, Deserialize)]
    struct EchoMsg {
        text: String,
    }

    impl Message for EchoMsg {
        const ROUTE: &'static str = "echo";
        const TYPE: &'static str = "echo";

        fn validate_basic(&self) -> Result<(), RouterError> {
            if self.text.is_empty() {
                return Err(RouterError::InvalidMessage("text is empty".into()));
            }
            Ok(())
        }

        fn approve_external(&self, _env: &Env) -> bool {
            true
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct ShoutMsg {
        text: String,
    }

    impl Message for ShoutMsg {
        const ROUTE: &'static str = "echo";
        const TYPE: &'static str = "shout";
    }

    #[derive(Default)]
    struct EchoHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Handler for EchoHandler {
        fn message_types(&self) -> &'static [&'static str] {
            &[EchoMsg::TYPE]
        }

        async fn handle(&self, _env: &Env, msg: AnyMessage) -> Result<Value, RouterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match msg.downcast::<EchoMsg>() {
                Ok(echo) => Ok(json!(echo.text)),
                Err(other) => Err(RouterError::UnknownMessageType(other.msg_type().to_string())),
            }
        }
    }

    fn router() -> Router {
        Router::new(Arc::new(ExtensionEnvProducer::new("ext-id", EXT_ORIGIN)))
    }

    fn internal_ctx() -> RawContext {
        RawContext::new("ext-id", "chrome-extension://ext-id/popup.html")
    }

    fn echo(origin: &str, text: &str) -> RoutedMessage {
        RoutedMessage::new(origin, &EchoMsg { text: text.into() }).unwrap()
    }

    #[tokio::test]
    async fn dispatches_to_handler() {
        let mut router = router();
        let handler = Arc::new(EchoHandler::default());
        router.register_message::<EchoMsg>().unwrap();
        router.add_handler("echo", handler.clone()).unwrap();

        let value = router.dispatch(&internal_ctx(), echo(EXT_ORIGIN, "hello")).await.unwrap();
        assert_eq!(value, json!("hello"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registered_message_without_handler() {
        let mut router = router();
        router.register_message::<EchoMsg>().unwrap();

        let err = router.dispatch(&internal_ctx(), echo(EXT_ORIGIN, "hello")).await.unwrap_err();
        assert_eq!(err, RouterError::NoHandler("echo".into()));
        assert_eq!(err.to_string(), "No handler for route echo");
    }

    #[tokio::test]
    async fn failing_guard_stops_pipeline() {
        let mut router = router();
        let handler = Arc::new(EchoHandler::default());
        let second_guard_calls = Arc::new(AtomicUsize::new(0));

        router.register_message::<EchoMsg>().unwrap();
        router.add_handler("echo", handler.clone()).unwrap();
        router.add_guard(|_env, _msg| Err(RouterError::rejected("first", "first guard says no")));
        let counter = second_guard_calls.clone();
        router.add_guard(move |_env, _msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = router.dispatch(&internal_ctx(), echo(EXT_ORIGIN, "hello")).await.unwrap_err();
        assert!(matches!(err, RouterError::Rejected { guard: "first", .. }));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_guard_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn guards_run_in_order() {
        let mut router = router();
        let handler = Arc::new(EchoHandler::default());
        router.register_message::<EchoMsg>().unwrap();
        router.add_handler("echo", handler.clone()).unwrap();
        router.add_guard(|_env, _msg| Ok(()));
        router.add_guard(|_env, _msg| Err(RouterError::rejected("second", "no")));

        let err = router.dispatch(&internal_ctx(), echo(EXT_ORIGIN, "x")).await.unwrap_err();
        assert!(matches!(err, RouterError::Rejected { guard: "second", .. }));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_registrations_rejected() {
        let mut router = router();
        router.register_message::<EchoMsg>().unwrap();
        assert_eq!(
            router.register_message::<EchoMsg>(),
            Err(RouterError::DuplicateMessage {
                route: "echo",
                msg_type: "echo"
            })
        );

        router.add_handler("echo", Arc::new(EchoHandler::default())).unwrap();
        let err = router
            .add_handler("echo", Arc::new(EchoHandler::default()))
            .unwrap_err();
        assert_eq!(err, RouterError::DuplicateHandler("echo"));
    }

    #[tokio::test]
    async fn handler_must_cover_registered_types() {
        let mut router = router();
        router.register_message::<EchoMsg>().unwrap();
        router.register_message::<ShoutMsg>().unwrap();
        let err = router
            .add_handler("echo", Arc::new(EchoHandler::default()))
            .unwrap_err();
        assert_eq!(
            err,
            RouterError::UnhandledMessageType {
                route: "echo",
                msg_type: "shout"
            }
        );

        let mut router = self::router();
        router.add_handler("echo", Arc::new(EchoHandler::default())).unwrap();
        assert!(router.register_message::<ShoutMsg>().is_err());
    }

    #[tokio::test]
    async fn unregistered_and_invalid_messages() {
        let mut router = router();
        router.register_message::<EchoMsg>().unwrap();
        router.add_handler("echo", Arc::new(EchoHandler::default())).unwrap();

        let unknown = RoutedMessage {
            route: "echo".into(),
            msg_type: "whisper".into(),
            origin: EXT_ORIGIN.into(),
            msg: json!({}),
        };
        let err = router.dispatch(&internal_ctx(), unknown).await.unwrap_err();
        assert!(matches!(err, RouterError::UnregisteredMessage { .. }));

        let malformed = RoutedMessage {
            route: "echo".into(),
            msg_type: "echo".into(),
            origin: EXT_ORIGIN.into(),
            msg: json!({"text": 5}),
        };
        let err = router.dispatch(&internal_ctx(), malformed).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidMessage(_)));

        let err = router.dispatch(&internal_ctx(), echo(EXT_ORIGIN, "")).await.unwrap_err();
        assert!(matches!(err, RouterError::InvalidMessage(_)));
    }

    #[tokio::test]
    async fn external_rejection_is_redacted() {
        let mut router = router();
        router.register_message::<ShoutMsg>().unwrap();
        router.add_guard(check_origin_is_valid);
        router.add_guard(check_message_is_internal);

        let ctx = RawContext::new("other", "https://dapp.example/page");
        let routed = RoutedMessage::new("https://dapp.example", &ShoutMsg { text: "x".into() }).unwrap();
        let response = router.handle(&ctx, routed).await;

        let error = response.error.unwrap();
        assert_eq!(error.message, PERMISSION_REJECTED);
        assert_eq!(error.kind, ErrorKind::Authorization);
        assert_eq!(error.code, "permission_rejected");
    }

    #[tokio::test]
    async fn spoofed_origin_is_rejected() {
        let mut router = router();
        let handler = Arc::new(EchoHandler::default());
        router.register_message::<EchoMsg>().unwrap();
        router.add_handler("echo", handler.clone()).unwrap();
        router.add_guard(check_origin_is_valid);
        router.add_guard(check_message_is_internal);

        let ctx = RawContext::new("other", "https://evil.example/");
        let routed = echo("https://trusted.example", "x");
        let err = router.dispatch(&ctx, routed).await.unwrap_err();
        assert!(matches!(err, RouterError::Rejected { guard: "origin-is-valid", .. }));

        let ok = router.handle(&ctx, echo("https://evil.example", "x")).await;
        assert!(ok.is_success());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }
}
