// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Persistent Storage
//!
//! The wallet core consumes persistence as an opaque get/set/delete
//! interface ([`KvStore`]). Two backends ship with the crate:
//!
//! - [`MemoryKvStore`] - volatile, used by tests
//! - [`FileKvStore`] - one JSON document per key under `DATA_DIR/kv`
//!
//! ## Stored Keys
//!
//! ```text
//! keyring/key-multi-store        # Vec<KeyStore>
//! keyring/key-store-selected     # selected index
//! permission/permission-origins  # permission table
//! code-hash/{chain}/{contract}   # confidential contract code hash
//! ```

pub mod file_store;
pub mod kv;

pub use file_store::FileKvStore;
pub use kv::{KvStore, MemoryKvStore, PrefixedStore, StorageError, StorageResult};
