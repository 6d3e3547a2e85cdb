// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory of the key-value store | `./data` |
//! | `HOST` | Bridge bind address (loopback only) | `127.0.0.1` |
//! | `PORT` | Bridge bind port | `8787` |
//! | `EXTENSION_ID` | Sender id of the extension itself | `wallet-core` |
//! | `EXTENSION_ORIGIN` | Origin of the extension's own pages | `chrome-extension://wallet-core` |
//! | `LCD_URL` | REST endpoint of the confidential chain | `http://localhost:1317` |
//! | `CHAIN_ID` | Chain served by the query layer | `secret-4` |
//! | `BRIDGE_TOKEN` | Bearer token required on `/v1/message` | generated into `DATA_DIR/bridge-token` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tracing::warn;

/// Environment variable name for the data directory path.
///
/// Key stores, the permission table and contract code hashes are persisted
/// here, one JSON document per key.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const HOST_ENV: &str = "HOST";
pub const DEFAULT_HOST: &str = "127.0.0.1";

pub const PORT_ENV: &str = "PORT";
pub const DEFAULT_PORT: u16 = 8787;

/// Sender id the transport reports for the extension's own contexts.
pub const EXTENSION_ID_ENV: &str = "EXTENSION_ID";
pub const DEFAULT_EXTENSION_ID: &str = "wallet-core";

pub const EXTENSION_ORIGIN_ENV: &str = "EXTENSION_ORIGIN";
pub const DEFAULT_EXTENSION_ORIGIN: &str = "chrome-extension://wallet-core";

pub const LCD_URL_ENV: &str = "LCD_URL";
pub const DEFAULT_LCD_URL: &str = "http://localhost:1317";

pub const CHAIN_ID_ENV: &str = "CHAIN_ID";
pub const DEFAULT_CHAIN_ID: &str = "secret-4";

/// Shared secret the extension transport presents as a bearer token.
///
/// When unset, a token is generated at startup and written to
/// [`BRIDGE_TOKEN_FILE`] under the data directory.
pub const BRIDGE_TOKEN_ENV: &str = "BRIDGE_TOKEN";
pub const BRIDGE_TOKEN_FILE: &str = "bridge-token";

/// `json` selects the JSON log formatter.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub extension_id: String,
    pub extension_origin: String,
    pub lcd_url: String,
    pub chain_id: String,
    pub bridge_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            extension_id: DEFAULT_EXTENSION_ID.to_string(),
            extension_origin: DEFAULT_EXTENSION_ORIGIN.to_string(),
            lcd_url: DEFAULT_LCD_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            bridge_token: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Invalid values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = match lookup(HOST_ENV).map(|h| h.parse::<IpAddr>()) {
            Some(Ok(host)) if host.is_loopback() => host,
            Some(Ok(host)) => {
                warn!(%host, "Refusing non-loopback bind address, using {DEFAULT_HOST}");
                defaults.host
            }
            Some(Err(_)) => {
                warn!("Invalid {HOST_ENV}, using {DEFAULT_HOST}");
                defaults.host
            }
            None => defaults.host,
        };
        let port = lookup(PORT_ENV)
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            data_dir: PathBuf::from(var(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            host,
            port,
            extension_id: var(EXTENSION_ID_ENV, DEFAULT_EXTENSION_ID),
            extension_origin: var(EXTENSION_ORIGIN_ENV, DEFAULT_EXTENSION_ORIGIN)
                .trim_end_matches('/')
                .to_string(),
            lcd_url: var(LCD_URL_ENV, DEFAULT_LCD_URL),
            chain_id: var(CHAIN_ID_ENV, DEFAULT_CHAIN_ID),
            bridge_token: lookup(BRIDGE_TOKEN_ENV).filter(|token| !token.trim().is_empty()),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn bridge_token_path(&self) -> PathBuf {
        self.data_dir.join(BRIDGE_TOKEN_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:8787");
    }

    #[test]
    fn overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("CHAIN_ID", "pulsar-3"),
            ("EXTENSION_ORIGIN", "chrome-extension://abc/"),
        ]));
        assert_eq!(config.port, 9000);
        assert_eq!(config.chain_id, "pulsar-3");
        assert_eq!(config.extension_origin, "chrome-extension://abc");
    }

    #[test]
    fn blank_bridge_token_is_unset() {
        let config = AppConfig::from_lookup(lookup(&[("BRIDGE_TOKEN", "  ")]));
        assert_eq!(config.bridge_token, None);

        let config = AppConfig::from_lookup(lookup(&[("BRIDGE_TOKEN", "s3cret"), ("DATA_DIR", "/tmp/w")]));
        assert_eq!(config.bridge_token.as_deref(), Some("s3cret"));
        assert_eq!(config.bridge_token_path(), PathBuf::from("/tmp/w/bridge-token"));
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = AppConfig::from_lookup(lookup(&[("PORT", "http"), ("HOST", "0.0.0.0")]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.host.is_loopback());

        let config = AppConfig::from_lookup(lookup(&[("HOST", "::1")]));
        assert_eq!(config.host.to_string(), "::1");
    }
}
