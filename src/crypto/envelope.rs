// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Wire shapes for encrypted payloads
//!
//! ```json
//! { "encrypted": true,
//!   "payload": { "ciphertext": "<b64>", "nonce": "<b64>", "publicKey": "<b64>" } }
//! ```
//!
//! The same body shape is used for requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::CryptoError;

/// One `box`-encrypted payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub nonce: String,
    /// Public key of the party that sealed the payload
    #[serde(alias = "senderPublicKey")]
    pub public_key: String,
}

/// One `secretbox`-encrypted payload (session key path)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricEnvelope {
    pub ciphertext: String,
    pub nonce: String,
}

/// Request/response body wrapper `{encrypted: true, payload}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBody {
    pub encrypted: bool,
    pub payload: EncryptedEnvelope,
}

impl EncryptedBody {
    pub fn new(payload: EncryptedEnvelope) -> Self {
        Self {
            encrypted: true,
            payload,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "encrypted": true,
            "payload": {
                "ciphertext": self.payload.ciphertext,
                "nonce": self.payload.nonce,
                "publicKey": self.payload.public_key,
            }
        })
    }

    /// Inspect a JSON body.
    ///
    /// - `None`: the body is not encrypted and passes through untouched.
    /// - `Some(Ok(envelope))`: the body claims to be encrypted and is well formed.
    /// - `Some(Err(_))`: the body claims to be encrypted but the envelope is malformed,
    ///   which is a decryption failure, never plaintext.
    pub fn detect(body: &Value) -> Option<Result<EncryptedEnvelope, CryptoError>> {
        let object = body.as_object()?;
        if object.get("encrypted").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        let Some(payload) = object.get("payload") else {
            return Some(Err(CryptoError::InvalidPayload {
                field: "payload".to_string(),
                reason: "encrypted body without payload".to_string(),
            }));
        };
        Some(
            serde_json::from_value::<EncryptedEnvelope>(payload.clone()).map_err(|e| {
                CryptoError::InvalidPayload {
                    field: "payload".to_string(),
                    reason: e.to_string(),
                }
            }),
        )
    }
}
