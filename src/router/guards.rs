// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guards run before every dispatch, in registration order.

use std::sync::Arc;

use super::env::Env;
use super::error::RouterError;
use super::message::AnyMessage;

/// Pure predicate over the caller and the message.
pub type Guard = Arc<dyn Fn(&Env, &AnyMessage) -> Result<(), RouterError> + Send + Sync>;

/// The origin a message claims must be the origin it was actually sent from.
pub fn check_origin_is_valid(env: &Env, msg: &AnyMessage) -> Result<(), RouterError> {
    if msg.origin() != env.origin {
        return Err(RouterError::rejected(
            "origin-is-valid",
            format!(
                "Invalid origin: message claims {} but was sent from {}",
                msg.origin(),
                env.origin
            ),
        ));
    }
    Ok(())
}

/// External senders may only send messages that approve external use.
pub fn check_message_is_internal(env: &Env, msg: &AnyMessage) -> Result<(), RouterError> {
    if !env.is_internal && !msg.approve_external(env) {
        return Err(RouterError::rejected(
            "message-is-internal",
            format!(
                "Message {}/{} from {} is only allowed internally",
                msg.route(),
                msg.msg_type(),
                env.origin
            ),
        ));
    }
    Ok(())
}
