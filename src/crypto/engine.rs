// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Engine
//!
//! Stateful encryption service for one client. Holds the client key pair, the
//! server public key and the optional session key, and persists all three
//! through the injected [`KeyStore`].
//!
//! Key pair initialization is single-flight: the key pair mutex is held across
//! load, generate and save, so racing callers can never persist two competing
//! key pairs.

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::envelope::{EncryptedEnvelope, SymmetricEnvelope};
use super::keys::{KeyPair, KEY_LENGTH};
use super::nacl;
use super::CryptoError;
use crate::storage::{
    KeyStore, CLIENT_KEY_PAIR_SLOT, ENCRYPTION_HINT_SLOT, SERVER_PUBLIC_KEY_SLOT,
    SESSION_KEY_SLOT,
};

/// Serialize `value` to JSON and seal it for `recipient_public_key`.
pub fn seal_object<T: Serialize + ?Sized>(
    value: &T,
    recipient_public_key: &[u8; KEY_LENGTH],
    own_keys: &KeyPair,
) -> Result<EncryptedEnvelope, CryptoError> {
    let json = serde_json::to_string(value)?;
    nacl::encrypt_asymmetric(&json, recipient_public_key, own_keys)
}

/// Open an envelope and deserialize the JSON inside it.
pub fn open_object<T: DeserializeOwned>(
    envelope: &EncryptedEnvelope,
    own_secret_key: &[u8; KEY_LENGTH],
) -> Result<T, CryptoError> {
    let json = nacl::decrypt_asymmetric(envelope, own_secret_key)?;
    Ok(serde_json::from_str(&json)?)
}

pub struct CryptoEngine {
    key_store: KeyStore,
    key_pair: Mutex<Option<KeyPair>>,
    server_public_key: RwLock<Option<[u8; KEY_LENGTH]>>,
    session_key: RwLock<Option<[u8; KEY_LENGTH]>>,
}

impl CryptoEngine {
    pub fn new(key_store: KeyStore) -> Self {
        Self {
            key_store,
            key_pair: Mutex::new(None),
            server_public_key: RwLock::new(None),
            session_key: RwLock::new(None),
        }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.key_store
    }

    /// Load the client key pair, generating and persisting one on first use.
    ///
    /// Also restores a previously stored server key and session key. Returns
    /// the client public key.
    pub async fn initialize(&self) -> Result<[u8; KEY_LENGTH], CryptoError> {
        let mut guard = self.key_pair.lock().await;

        let existing = guard.as_ref().map(|pair| pair.public_key);
        let public_key = match existing {
            Some(public_key) => public_key,
            None => {
                let pair = match self.key_store.load_key_pair().await {
                    Some(pair) => {
                        debug!("🔑 Loaded client key pair {}", pair.fingerprint());
                        pair
                    }
                    None => {
                        let pair = nacl::generate_key_pair();
                        self.key_store.save_key_pair(&pair).await.map_err(|e| {
                            CryptoError::Other(format!("failed to persist key pair: {}", e))
                        })?;
                        info!("🔑 Generated new client key pair {}", pair.fingerprint());
                        pair
                    }
                };
                let public_key = pair.public_key;
                *guard = Some(pair);
                public_key
            }
        };
        drop(guard);

        {
            let mut server = self.server_public_key.write().await;
            if server.is_none() {
                *server = self.key_store.load_server_public_key().await;
            }
        }
        {
            let mut session = self.session_key.write().await;
            if session.is_none() {
                *session = self.key_store.load_session_key().await;
            }
        }

        Ok(public_key)
    }

    pub async fn key_pair(&self) -> Option<KeyPair> {
        self.key_pair.lock().await.clone()
    }

    pub async fn public_key_base64(&self) -> Option<String> {
        self.key_pair
            .lock()
            .await
            .as_ref()
            .map(KeyPair::public_key_base64)
    }

    pub async fn server_public_key(&self) -> Option<[u8; KEY_LENGTH]> {
        *self.server_public_key.read().await
    }

    /// Both the local key pair and a server key are loaded.
    pub async fn has_keys(&self) -> bool {
        self.key_pair.lock().await.is_some() && self.server_public_key.read().await.is_some()
    }

    pub async fn has_session_key(&self) -> bool {
        self.session_key.read().await.is_some()
    }

    /// Adopt a server public key and persist it. The in-memory key is kept even
    /// if persisting fails.
    pub async fn set_server_public_key(&self, key: [u8; KEY_LENGTH]) {
        *self.server_public_key.write().await = Some(key);
        if let Err(e) = self.key_store.save_server_public_key(&key).await {
            warn!("⚠️  Failed to persist server public key: {}", e);
        }
    }

    pub async fn encrypt_string(&self, plaintext: &str) -> Result<EncryptedEnvelope, CryptoError> {
        let server_key = self.require_server_key().await?;
        let guard = self.key_pair.lock().await;
        let pair = guard.as_ref().ok_or_else(|| missing("client_key_pair"))?;
        nacl::encrypt_asymmetric(plaintext, &server_key, pair)
    }

    pub async fn decrypt_string(&self, envelope: &EncryptedEnvelope) -> Result<String, CryptoError> {
        let guard = self.key_pair.lock().await;
        let pair = guard.as_ref().ok_or_else(|| missing("client_key_pair"))?;
        nacl::decrypt_asymmetric(envelope, &pair.secret_key)
    }

    pub async fn encrypt_object<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<EncryptedEnvelope, CryptoError> {
        let json = serde_json::to_string(value)?;
        self.encrypt_string(&json).await
    }

    pub async fn decrypt_object<T: DeserializeOwned>(
        &self,
        envelope: &EncryptedEnvelope,
    ) -> Result<T, CryptoError> {
        let json = self.decrypt_string(envelope).await?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Install a session key (e.g. one supplied by the server) and persist it.
    pub async fn set_session_key(&self, key: [u8; KEY_LENGTH]) {
        *self.session_key.write().await = Some(key);
        if let Err(e) = self.key_store.save_session_key(&key).await {
            warn!("⚠️  Failed to persist session key: {}", e);
        }
    }

    /// Generate a random session key locally, install and persist it.
    pub async fn generate_session_key(&self) -> [u8; KEY_LENGTH] {
        let key = nacl::generate_session_key();
        self.set_session_key(key).await;
        info!("🔑 Session key generated");
        key
    }

    pub async fn encrypt_with_session(
        &self,
        plaintext: &str,
    ) -> Result<SymmetricEnvelope, CryptoError> {
        let key = self.require_session_key().await?;
        nacl::encrypt_symmetric(plaintext, &key)
    }

    pub async fn decrypt_with_session(
        &self,
        envelope: &SymmetricEnvelope,
    ) -> Result<String, CryptoError> {
        let key = self.require_session_key().await?;
        nacl::decrypt_symmetric(envelope, &key)
    }

    /// Drop the session key from memory and storage (logout).
    pub async fn clear_session(&self) {
        *self.session_key.write().await = None;
        if let Err(e) = self.key_store.clear_session_key().await {
            warn!("⚠️  Failed to clear stored session key: {}", e);
        }
        info!("🗑️  Session key cleared");
    }

    /// Destroy every key this engine owns, including the client key pair.
    /// The next `initialize` generates a fresh pair.
    pub async fn reset(&self) {
        *self.key_pair.lock().await = None;
        *self.server_public_key.write().await = None;
        *self.session_key.write().await = None;

        for slot in [
            CLIENT_KEY_PAIR_SLOT,
            SERVER_PUBLIC_KEY_SLOT,
            SESSION_KEY_SLOT,
            ENCRYPTION_HINT_SLOT,
        ] {
            if let Err(e) = self.key_store.clear(slot).await {
                warn!("⚠️  Failed to clear slot '{}': {}", slot, e);
            }
        }
        info!("🗑️  Encryption keys reset");
    }

    async fn require_server_key(&self) -> Result<[u8; KEY_LENGTH], CryptoError> {
        self.server_public_key
            .read()
            .await
            .ok_or_else(|| missing("server_public_key"))
    }

    async fn require_session_key(&self) -> Result<[u8; KEY_LENGTH], CryptoError> {
        self.session_key
            .read()
            .await
            .ok_or_else(|| missing("session_key"))
    }
}

fn missing(key_type: &str) -> CryptoError {
    CryptoError::MissingKey {
        key_type: key_type.to_string(),
    }
}
