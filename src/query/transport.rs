// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chain REST transport.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::QueryError;

/// Default request timeout for the chain REST endpoint.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Successful response of a [`Transport::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body. `None` when the body was empty.
    pub data: Option<Value>,
}

/// GET requests against one chain endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL every path is resolved against. Part of cache keys.
    fn base_url(&self) -> &str;

    /// Fetch `path`. Resolves to [`QueryError::Cancelled`] as soon as
    /// `cancel` fires.
    async fn fetch(&self, path: &str, cancel: &CancellationToken) -> Result<TransportResponse, QueryError>;
}

/// [`Transport`] over `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| QueryError::transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    async fn get(&self, path: &str) -> Result<TransportResponse, QueryError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QueryError::transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueryError::transport(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
            return Err(QueryError::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        let data = if body.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&body).map_err(|e| QueryError::Protocol(e.to_string()))?)
        };

        debug!(status = status.as_u16(), path, "Chain query fetched");
        Ok(TransportResponse {
            status: status.as_u16(),
            data,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, path: &str, cancel: &CancellationToken) -> Result<TransportResponse, QueryError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(QueryError::Cancelled),
            result = self.get(path) => result,
        }
    }
}

/// `error` or `message` field of an LCD error body, if any.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let transport = HttpTransport::new("http://localhost:1317/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:1317");
    }

    #[test]
    fn lcd_error_body() {
        assert_eq!(
            error_message(r#"{"error":"contract not found"}"#).as_deref(),
            Some("contract not found")
        );
        assert_eq!(error_message("<html>"), None);
    }

    #[tokio::test]
    async fn cancelled_before_send() {
        let transport = HttpTransport::new("http://127.0.0.1:9").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = transport.fetch("/bank/balances/secret1abc", &token).await;
        assert_eq!(result, Err(QueryError::Cancelled));
    }
}
