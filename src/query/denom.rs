// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Minimal denominations.
//!
//! ```text
//! uscrt                                  # native
//! secret20:secret1xyz...:sscrt           # token contract
//! {type}:{contract address}:{symbol}     # any other contract type
//! ```

use std::fmt;

use super::error::QueryError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DenomKind {
    Native,
    Secret20,
    /// A contract token type no registry in this crate knows.
    Other(String),
}

/// Parsed minimal denomination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DenomHelper {
    minimal_denom: String,
    kind: DenomKind,
    contract_address: String,
    denom: String,
}

impl DenomHelper {
    pub fn parse(minimal_denom: &str) -> Result<Self, QueryError> {
        let invalid = || QueryError::InvalidDenom(minimal_denom.to_string());
        let is_word = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        let parts: Vec<&str> = minimal_denom.split(':').collect();
        match parts.as_slice() {
            [denom] if !denom.is_empty() => Ok(Self {
                minimal_denom: minimal_denom.to_string(),
                kind: DenomKind::Native,
                contract_address: String::new(),
                denom: denom.to_string(),
            }),
            [kind, contract, denom] if is_word(kind) && is_word(contract) && is_word(denom) => {
                let kind = match *kind {
                    "native" => return Err(invalid()),
                    "secret20" => DenomKind::Secret20,
                    other => DenomKind::Other(other.to_string()),
                };
                Ok(Self {
                    minimal_denom: minimal_denom.to_string(),
                    kind,
                    contract_address: contract.to_string(),
                    denom: denom.to_string(),
                })
            }
            _ => Err(invalid()),
        }
    }

    pub fn kind(&self) -> &DenomKind {
        &self.kind
    }

    /// `native`, `secret20`, or the contract type as written.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            DenomKind::Native => "native",
            DenomKind::Secret20 => "secret20",
            DenomKind::Other(kind) => kind,
        }
    }

    /// Empty for native denominations.
    pub fn contract_address(&self) -> &str {
        &self.contract_address
    }

    /// The bare denomination, without type and contract.
    pub fn denom(&self) -> &str {
        &self.denom
    }

    /// The denomination as it was parsed.
    pub fn minimal_denom(&self) -> &str {
        &self.minimal_denom
    }
}

impl fmt::Display for DenomHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.minimal_denom)
    }
}
