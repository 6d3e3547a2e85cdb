// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Query errors.
//!
//! Query state is observable and cloned into every snapshot, so the error
//! type is `Clone` and carries strings rather than source errors.

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Contract address is empty")]
    ContractAddressEmpty,

    #[error("Address is empty")]
    AddressEmpty,

    #[error("Viewing key is empty")]
    ViewingKeyEmpty,

    /// The contract answered with `viewing_key_error`.
    #[error("{0}")]
    WrongViewingKey(String),

    /// No encryption session is installed for the chain.
    #[error("Keplr API not initialized")]
    SessionUnavailable,

    #[error("Nonce is unknown")]
    NonceUnknown,

    #[error("Failed to get the response from the contract")]
    EmptyResponse,

    #[error("Chain {0} is not configured")]
    UnknownChain(String),

    #[error("Invalid denomination: {0}")]
    InvalidDenom(String),

    #[error("No balance registry understands denomination {0}")]
    UnknownDenom(String),

    /// Network failure or a non-success HTTP status.
    #[error("{message}")]
    Transport { status: Option<u16>, message: String },

    #[error("Request cancelled")]
    Cancelled,

    /// The response did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::ContractAddressEmpty
            | QueryError::AddressEmpty
            | QueryError::SessionUnavailable
            | QueryError::NonceUnknown
            | QueryError::UnknownChain(_) => ErrorKind::Precondition,
            QueryError::ViewingKeyEmpty | QueryError::WrongViewingKey(_) => ErrorKind::Credential,
            QueryError::InvalidDenom(_) | QueryError::UnknownDenom(_) => ErrorKind::Validation,
            QueryError::Transport { .. } | QueryError::Cancelled => ErrorKind::Transport,
            QueryError::EmptyResponse | QueryError::Protocol(_) => ErrorKind::Protocol,
            QueryError::Encryption(_) => ErrorKind::Internal,
            QueryError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            QueryError::ContractAddressEmpty => "contract_address_empty",
            QueryError::AddressEmpty => "address_empty",
            QueryError::ViewingKeyEmpty => "viewing_key_empty",
            QueryError::WrongViewingKey(_) => "wrong_viewing_key",
            QueryError::SessionUnavailable => "session_unavailable",
            QueryError::NonceUnknown => "nonce_unknown",
            QueryError::EmptyResponse => "empty_response",
            QueryError::UnknownChain(_) => "unknown_chain",
            QueryError::InvalidDenom(_) => "invalid_denom",
            QueryError::UnknownDenom(_) => "unknown_denom",
            QueryError::Transport { .. } => "transport_error",
            QueryError::Cancelled => "cancelled",
            QueryError::Protocol(_) => "protocol_error",
            QueryError::Encryption(_) => "encryption_error",
            QueryError::Storage(_) => "storage_error",
        }
    }

    /// HTTP status of the failed request, `0` when there was none.
    pub fn status(&self) -> u16 {
        match self {
            QueryError::Transport { status, .. } => status.unwrap_or(0),
            _ => 0,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        QueryError::Transport {
            status: None,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewing_key_errors_are_credential_errors() {
        assert_eq!(QueryError::ViewingKeyEmpty.kind(), ErrorKind::Credential);
        assert_eq!(QueryError::ViewingKeyEmpty.to_string(), "Viewing key is empty");

        let wrong = QueryError::WrongViewingKey("Wrong viewing key for this address or viewing key not set".into());
        assert_eq!(wrong.kind(), ErrorKind::Credential);
        assert!(wrong.kind().is_retryable());
        assert_ne!(wrong.kind(), QueryError::transport("down").kind());
    }

    #[test]
    fn legacy_messages_are_kept() {
        assert_eq!(QueryError::SessionUnavailable.to_string(), "Keplr API not initialized");
        assert_eq!(QueryError::NonceUnknown.to_string(), "Nonce is unknown");
        assert_eq!(
            QueryError::EmptyResponse.to_string(),
            "Failed to get the response from the contract"
        );
        assert_eq!(QueryError::ContractAddressEmpty.to_string(), "Contract address is empty");
    }

    #[test]
    fn transport_status() {
        let err = QueryError::Transport {
            status: Some(502),
            message: "Bad gateway".into(),
        };
        assert_eq!(err.status(), 502);
        assert_eq!(QueryError::Cancelled.status(), 0);
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
