// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Core - Trusted background core of the browser wallet
//!
//! Holds the user's encrypted key material and is the only component that
//! can read it. Every external context reaches it through the message router.
//!
//! ## Modules
//!
//! - `keyring` - key vault: password-based encryption of key stores
//! - `router` - message router with its guard pipeline
//! - `permission` - per-origin permission table
//! - `query` - chain queries, encrypted contract queries, balances
//! - `storage` - key-value persistence
//! - `api` - loopback HTTP bridge (Axum)

pub mod api;
pub mod config;
pub mod error;
pub mod keyring;
pub mod permission;
pub mod query;
pub mod router;
pub mod state;
pub mod storage;
