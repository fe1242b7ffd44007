// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Key Store
//!
//! Typed slots on top of a [`KeyValueStore`]. Storage-layer read or parse
//! failures are logged and reported as "absent" so callers fall through to
//! regeneration instead of failing.

use std::sync::Arc;
use tracing::warn;

use super::kv_store::{KeyValueStore, StorageError};
use crate::crypto::keys::{decode_key, encode, StoredKeyPair, KEY_LENGTH};
use crate::crypto::KeyPair;

pub const CLIENT_KEY_PAIR_SLOT: &str = "client_key_pair";
pub const SERVER_PUBLIC_KEY_SLOT: &str = "server_public_key";
pub const SESSION_KEY_SLOT: &str = "session_key";
pub const ENCRYPTION_HINT_SLOT: &str = "encryption_negotiated";
pub const ACCESS_TOKEN_SLOT: &str = "access_token";
pub const REFRESH_TOKEN_SLOT: &str = "refresh_token";

#[derive(Clone)]
pub struct KeyStore {
    backend: Arc<dyn KeyValueStore>,
}

impl KeyStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    pub async fn load_key_pair(&self) -> Option<KeyPair> {
        let raw = self.load_text(CLIENT_KEY_PAIR_SLOT).await?;
        let stored: StoredKeyPair = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!("⚠️  Stored client key pair is unreadable, ignoring: {}", e);
                return None;
            }
        };
        match KeyPair::try_from(stored) {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!("⚠️  Stored client key pair is invalid, ignoring: {}", e);
                None
            }
        }
    }

    pub async fn save_key_pair(&self, pair: &KeyPair) -> Result<(), StorageError> {
        let json = serde_json::to_vec(&StoredKeyPair::from(pair))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.save(CLIENT_KEY_PAIR_SLOT, &json).await
    }

    pub async fn load_server_public_key(&self) -> Option<[u8; KEY_LENGTH]> {
        self.load_key(SERVER_PUBLIC_KEY_SLOT).await
    }

    pub async fn save_server_public_key(
        &self,
        key: &[u8; KEY_LENGTH],
    ) -> Result<(), StorageError> {
        self.backend
            .save(SERVER_PUBLIC_KEY_SLOT, encode(key).as_bytes())
            .await
    }

    pub async fn load_session_key(&self) -> Option<[u8; KEY_LENGTH]> {
        self.load_key(SESSION_KEY_SLOT).await
    }

    pub async fn save_session_key(&self, key: &[u8; KEY_LENGTH]) -> Result<(), StorageError> {
        self.backend
            .save(SESSION_KEY_SLOT, encode(key).as_bytes())
            .await
    }

    pub async fn clear_session_key(&self) -> Result<(), StorageError> {
        self.backend.clear(SESSION_KEY_SLOT).await
    }

    /// Whether encryption was ever negotiated. A hint only; every process start
    /// re-verifies with the server.
    pub async fn load_negotiated_hint(&self) -> bool {
        matches!(
            self.load_text(ENCRYPTION_HINT_SLOT).await.as_deref(),
            Some("true")
        )
    }

    pub async fn save_negotiated_hint(&self, negotiated: bool) -> Result<(), StorageError> {
        let value = if negotiated { "true" } else { "false" };
        self.backend
            .save(ENCRYPTION_HINT_SLOT, value.as_bytes())
            .await
    }

    pub async fn load_token(&self, slot: &str) -> Option<String> {
        self.load_text(slot).await
    }

    pub async fn save_token(&self, slot: &str, token: &str) -> Result<(), StorageError> {
        self.backend.save(slot, token.as_bytes()).await
    }

    pub async fn clear(&self, slot: &str) -> Result<(), StorageError> {
        self.backend.clear(slot).await
    }

    pub async fn clear_all(&self) -> Result<(), StorageError> {
        self.backend.clear_all().await
    }

    async fn load_key(&self, slot: &str) -> Option<[u8; KEY_LENGTH]> {
        let raw = self.load_text(slot).await?;
        match decode_key(raw.trim(), slot) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("⚠️  Stored {} is invalid, ignoring: {}", slot, e);
                None
            }
        }
    }

    async fn load_text(&self, slot: &str) -> Option<String> {
        let bytes = match self.backend.load(slot).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!("⚠️  Failed to read slot '{}', treating as absent: {}", slot, e);
                return None;
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(_) => {
                warn!("⚠️  Slot '{}' is not valid UTF-8, treating as absent", slot);
                None
            }
        }
    }
}
