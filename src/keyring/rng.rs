// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Injected randomness for salts and IVs.

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::RngCore;

use super::crypto::CryptoError;

/// Source of cryptographically secure random bytes.
///
/// Injected rather than hard-coded so tests can pin salts and IVs.
#[async_trait]
pub trait RandomSource: Send + Sync {
    async fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

#[async_trait]
impl RandomSource for OsRandom {
    async fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| CryptoError::Random(e.to_string()))
    }
}

/// Deterministic source: byte `i` of every fill is `seed + i`.
///
/// Only for tests and reproducible fixtures. Never use it for real keys.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom {
    pub seed: u8,
}

impl FixedRandom {
    pub fn new(seed: u8) -> Self {
        Self { seed }
    }
}

#[async_trait]
impl RandomSource for FixedRandom {
    async fn fill(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.seed.wrapping_add(i as u8);
        }
        Ok(())
    }
}
