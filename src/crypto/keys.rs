// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key material for NaCl `box` / `secretbox`
//!
//! X25519 key pairs and 32-byte symmetric keys, plus the base64 helpers every
//! value uses when it crosses the wire or hits storage (standard alphabet,
//! padded, never URL-safe).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use crypto_box::SecretKey;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::CryptoError;

/// X25519 key length (public and secret)
pub const KEY_LENGTH: usize = 32;

/// Client key pair for NaCl `box`
///
/// The secret half is wiped from memory when the pair is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    pub public_key: [u8; KEY_LENGTH],
    pub secret_key: [u8; KEY_LENGTH],
}

impl KeyPair {
    /// Rebuild a pair from a secret key, deriving the public half.
    pub fn from_secret_key(secret_key: [u8; KEY_LENGTH]) -> Self {
        let sk = SecretKey::from(secret_key);
        let public_key = *sk.public_key().as_bytes();
        Self {
            public_key,
            secret_key,
        }
    }

    pub fn public_key_base64(&self) -> String {
        encode(&self.public_key)
    }

    /// Short hex fingerprint of the public key, safe to log.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.fingerprint())
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Persisted form of a [`KeyPair`]: both halves as base64.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKeyPair {
    pub public_key: String,
    pub secret_key: String,
}

impl From<&KeyPair> for StoredKeyPair {
    fn from(pair: &KeyPair) -> Self {
        Self {
            public_key: encode(&pair.public_key),
            secret_key: encode(&pair.secret_key),
        }
    }
}

impl TryFrom<StoredKeyPair> for KeyPair {
    type Error = CryptoError;

    fn try_from(stored: StoredKeyPair) -> Result<Self, Self::Error> {
        let secret_key = decode_key(&stored.secret_key, "client_secret_key")?;
        let pair = KeyPair::from_secret_key(secret_key);
        let public_key = decode_key(&stored.public_key, "client_public_key")?;
        if public_key != pair.public_key {
            return Err(CryptoError::InvalidKey {
                key_type: "client_public_key".to_string(),
                reason: "public key does not match secret key".to_string(),
            });
        }
        Ok(pair)
    }
}

/// Standard base64 encoding
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Standard base64 decoding
pub fn decode(value: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(value)?)
}

/// Decode a base64 key and require exactly 32 bytes
pub fn decode_key(value: &str, key_type: &str) -> Result<[u8; KEY_LENGTH], CryptoError> {
    let bytes = STANDARD.decode(value).map_err(|e| CryptoError::InvalidKey {
        key_type: key_type.to_string(),
        reason: format!("base64 decode error: {}", e),
    })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey {
            key_type: key_type.to_string(),
            reason: format!(
                "expected {} bytes, got {}",
                KEY_LENGTH,
                bytes.len()
            ),
        })
}

pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode(&public_key[..public_key.len().min(8)])
}

pub(crate) fn random_array<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
