// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Error type for every operation of the encryption layer.
//!
//! ## Error Variants
//!
//! - **DecryptionFailed**: `box`/`secretbox` open failed (wrong key, tampered ciphertext, tag mismatch)
//! - **EncryptionFailed**: sealing failed inside the primitive
//! - **InvalidKey**: key has the wrong length or does not decode
//! - **InvalidNonce**: nonce is not exactly 24 bytes
//! - **InvalidPayload**: envelope field is missing or is not valid base64
//! - **MissingKey**: the operation needs a key that has not been loaded yet
//! - **Serialization**: JSON (de)serialization around an encrypted object failed
//! - **Other**: anything else
//!
//! `DecryptionFailed`, `InvalidNonce`, `InvalidKey` and `InvalidPayload` raised while
//! opening an envelope all mean "this was encrypted and could not be opened", which
//! callers must keep apart from "this was never encrypted".

use std::fmt;

/// Error type for all cryptographic operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authenticated decryption failed
    DecryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Sealing a payload failed
    EncryptionFailed {
        /// Which operation was being performed
        operation: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid cryptographic key
    InvalidKey {
        /// Type of key that failed (e.g., "server_public_key", "session_key")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// Invalid nonce size. NaCl box and secretbox both require 24-byte nonces.
    InvalidNonce {
        /// Expected nonce size (always 24)
        expected_size: usize,
        /// Actual nonce size provided
        actual_size: usize,
    },

    /// Envelope field failed validation
    InvalidPayload {
        /// Which field failed validation
        field: String,
        /// Specific failure reason
        reason: String,
    },

    /// A required key is not loaded
    MissingKey {
        /// Which key is missing
        key_type: String,
    },

    /// JSON serialization around an encrypted object failed
    Serialization(String),

    /// Generic error for library errors or unexpected failures
    Other(String),
}

impl CryptoError {
    /// True when the error came from opening something that was encrypted.
    pub fn is_decryption_failure(&self) -> bool {
        matches!(
            self,
            CryptoError::DecryptionFailed { .. }
                | CryptoError::InvalidNonce { .. }
                | CryptoError::InvalidKey { .. }
                | CryptoError::InvalidPayload { .. }
        )
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::DecryptionFailed { operation, reason } => {
                write!(f, "Decryption failed during {}: {}", operation, reason)
            }
            CryptoError::EncryptionFailed { operation, reason } => {
                write!(f, "Encryption failed during {}: {}", operation, reason)
            }
            CryptoError::InvalidKey { key_type, reason } => {
                write!(f, "Invalid key ({}): {}", key_type, reason)
            }
            CryptoError::InvalidNonce {
                expected_size,
                actual_size,
            } => {
                write!(
                    f,
                    "Invalid nonce size: expected {} bytes, got {} bytes",
                    expected_size, actual_size
                )
            }
            CryptoError::InvalidPayload { field, reason } => {
                write!(f, "Invalid payload field '{}': {}", field, reason)
            }
            CryptoError::MissingKey { key_type } => {
                write!(f, "Missing key: {}", key_type)
            }
            CryptoError::Serialization(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            CryptoError::Other(msg) => {
                write!(f, "Crypto error: {}", msg)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

impl From<anyhow::Error> for CryptoError {
    fn from(err: anyhow::Error) -> Self {
        CryptoError::Other(err.to_string())
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::InvalidPayload {
            field: "base64_field".to_string(),
            reason: format!("base64 decode error: {}", err),
        }
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        CryptoError::Serialization(err.to_string())
    }
}
