// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handshake Exchange
//!
//! Network half of the encryption handshake: the client posts its public key
//! and the server answers with its own key and whether it encrypts at all.
//!
//! ```text
//! POST /encryption/handshake   { "clientPublicKey": "<b64>" }
//! <-  { "success": true, "data": { "serverPublicKey": "<b64>", "encryptionEnabled": true } }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::crypto::EncryptedEnvelope;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed handshake response: {0}")]
    Malformed(String),
    #[error("Handshake rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub client_public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<HandshakeData>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeData {
    #[serde(default)]
    pub server_public_key: Option<String>,
    #[serde(default)]
    pub encryption_enabled: bool,
    /// Session key chosen by the server, sealed for the client key pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_session_key: Option<EncryptedEnvelope>,
}

impl HandshakeResponse {
    pub fn enabled(server_public_key: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(HandshakeData {
                server_public_key: Some(server_public_key.into()),
                encryption_enabled: true,
                encrypted_session_key: None,
            }),
            message: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            success: true,
            data: Some(HandshakeData {
                server_public_key: None,
                encryption_enabled: false,
                encrypted_session_key: None,
            }),
            message: None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HandshakeExchange: Send + Sync {
    /// Send the client public key (base64) and return the server's answer.
    async fn exchange(&self, client_public_key: &str) -> Result<HandshakeResponse, HandshakeError>;
}

/// reqwest-backed exchange against the configured handshake endpoint
#[derive(Debug, Clone)]
pub struct HttpHandshakeExchange {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpHandshakeExchange {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HandshakeExchange for HttpHandshakeExchange {
    async fn exchange(&self, client_public_key: &str) -> Result<HandshakeResponse, HandshakeError> {
        let request = HandshakeRequest {
            client_public_key: client_public_key.to_string(),
        };

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HandshakeError::Timeout(self.timeout)
                } else {
                    HandshakeError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandshakeError::Rejected(format!("HTTP {}", status)));
        }

        response
            .json::<HandshakeResponse>()
            .await
            .map_err(|e| HandshakeError::Malformed(e.to_string()))
    }
}
