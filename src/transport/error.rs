// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// The response was encrypted and could not be opened. The envelope is not
    /// handed out as plaintext.
    #[error("Failed to decrypt response: {0}")]
    Decryption(CryptoError),

    #[error("HTTP {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        body: Value,
    },

    /// Server ended the session with a terminal auth code; local tokens and
    /// encryption session state have been cleared.
    #[error("Session terminated: {code}")]
    SessionTerminated { code: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Client setup failed: {0}")]
    Setup(String),
}

impl TransportError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Serialization(err.to_string())
    }
}
