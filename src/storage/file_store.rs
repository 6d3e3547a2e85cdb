// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File-backed key-value store.
//!
//! ## Layout
//!
//! ```text
//! {DATA_DIR}/
//!   kv/
//!     {escaped key}.json
//! ```
//!
//! Each key is one JSON file. Writes go to a temp file first and are then
//! renamed over the target, so a reader sees either the old or the new
//! document, never a torn one.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use super::kv::{KvStore, StorageError, StorageResult};

/// Key-value store persisting one JSON document per key.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Open (and create if needed) a store rooted at `data_dir/kv`.
    pub fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let root = data_dir.as_ref().join("kv");
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory holding the key files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        Ok(self.root.join(format!("{}.json", escape_key(key))))
    }

    /// Check that the directory is writable with a write-read-delete cycle.
    pub fn health_check(&self) -> StorageResult<()> {
        let test_file = self.root.join(".health_check");
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "health check data mismatch",
            )));
        }
        Ok(())
    }
}

/// Escape every byte outside `[A-Za-z0-9_-]` as `%XX` so keys like
/// `keyring/key-multi-store` map to a single flat file name.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let path = self.path_for(key)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let value = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let path = self.path_for(key)?;

        let temp_path = path.with_extension("tmp");
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &value)?;
            writer.flush()?;
        }

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
