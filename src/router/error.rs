// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router errors.

use crate::error::ErrorKind;

/// Everything that can go wrong between receiving a routed message and
/// returning the handler's result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// The same (route, type) pair was registered twice.
    #[error("Message {route}/{msg_type} is already registered")]
    DuplicateMessage {
        route: &'static str,
        msg_type: &'static str,
    },

    /// A second handler was added for a route.
    #[error("Handler for route {0} is already registered")]
    DuplicateHandler(&'static str),

    /// A registered message type is not covered by the route's handler.
    #[error("Handler for route {route} does not handle message type {msg_type}")]
    UnhandledMessageType {
        route: &'static str,
        msg_type: &'static str,
    },

    /// No message was registered under this (route, type).
    #[error("Unregistered message type: {route}/{msg_type}")]
    UnregisteredMessage { route: String, msg_type: String },

    /// Payload failed to decode or failed its own validation.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// A guard refused the message.
    #[error("{reason}")]
    Rejected { guard: &'static str, reason: String },

    #[error("No handler for route {0}")]
    NoHandler(String),

    /// The handler received a message kind it does not know.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Error raised inside a handler, carried through unmodified.
    #[error("{message}")]
    Handler {
        kind: ErrorKind,
        code: &'static str,
        message: String,
    },
}

impl RouterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouterError::DuplicateMessage { .. }
            | RouterError::DuplicateHandler(_)
            | RouterError::UnhandledMessageType { .. } => ErrorKind::Internal,
            RouterError::UnregisteredMessage { .. }
            | RouterError::InvalidMessage(_)
            | RouterError::UnknownMessageType(_) => ErrorKind::Validation,
            RouterError::Rejected { .. } => ErrorKind::Authorization,
            RouterError::NoHandler(_) => ErrorKind::Precondition,
            RouterError::Handler { kind, .. } => *kind,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            RouterError::DuplicateMessage { .. } => "duplicate_message",
            RouterError::DuplicateHandler(_) => "duplicate_handler",
            RouterError::UnhandledMessageType { .. } => "unhandled_message_type",
            RouterError::UnregisteredMessage { .. } => "unregistered_message",
            RouterError::InvalidMessage(_) => "invalid_message",
            RouterError::Rejected { .. } => "permission_rejected",
            RouterError::NoHandler(_) => "no_handler",
            RouterError::UnknownMessageType(_) => "unknown_message_type",
            RouterError::Handler { code, .. } => code,
        }
    }

    /// Guard rejection helper.
    pub fn rejected(guard: &'static str, reason: impl Into<String>) -> Self {
        RouterError::Rejected {
            guard,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_codes() {
        let rejected = RouterError::rejected("origin-is-valid", "bad origin");
        assert_eq!(rejected.kind(), ErrorKind::Authorization);
        assert_eq!(rejected.error_code(), "permission_rejected");
        assert_eq!(rejected.to_string(), "bad origin");

        let no_handler = RouterError::NoHandler("keyring".to_string());
        assert_eq!(no_handler.to_string(), "No handler for route keyring");

        let handler = RouterError::Handler {
            kind: ErrorKind::Integrity,
            code: "unmatched_mac",
            message: "Unmatched mac".to_string(),
        };
        assert_eq!(handler.kind(), ErrorKind::Integrity);
        assert_eq!(handler.error_code(), "unmatched_mac");
    }
}
