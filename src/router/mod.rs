// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Message Router
//!
//! Typed message routing between untrusted contexts (dapp pages, popups)
//! and the trusted core.
//!
//! - [`message`] - the [`Message`] trait and the wire types
//! - [`env`] - caller environment derived from the transport context
//! - [`guards`] - predicates run before every dispatch
//! - [`handler`] - the per-route [`Handler`] trait
//! - [`dispatch`] - the [`Router`] pipeline

pub mod dispatch;
pub mod env;
pub mod error;
pub mod guards;
pub mod handler;
pub mod message;

pub use dispatch::{Router, PERMISSION_REJECTED};
pub use env::{Env, EnvProducer, ExtensionEnvProducer, RawContext};
pub use error::RouterError;
pub use guards::{check_message_is_internal, check_origin_is_valid, Guard};
pub use handler::{to_value, Handler};
pub use message::{AnyMessage, Message, RoutedMessage, RouterResponse, WireError};
