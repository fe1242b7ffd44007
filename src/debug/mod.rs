// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Debug console
//!
//! Manual inspection of the encryption layer: current state, and
//! encrypt/decrypt with the live keys. Diagnostic only; nothing in the request
//! pipeline calls into this module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::crypto::keys::fingerprint;
use crate::crypto::{CryptoError, EncryptedEnvelope};
use crate::session::{EncryptionSession, EncryptionStatus};
use crate::version;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub version: String,
    pub checked_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: EncryptionStatus,
}

pub struct DebugConsole {
    session: EncryptionSession,
}

impl DebugConsole {
    pub fn new(session: EncryptionSession) -> Self {
        Self { session }
    }

    /// State snapshot. Does not start a handshake or generate keys; keys not
    /// loaded yet in this process are read from the key store.
    pub async fn status(&self) -> DebugReport {
        let mut status = self.session.status().await;
        let key_store = self.session.crypto().key_store();
        if status.client_public_key.is_none() {
            if let Some(pair) = key_store.load_key_pair().await {
                status.has_keys = true;
                status.client_public_key = Some(pair.public_key_base64());
            }
        }
        if status.server_key_fingerprint.is_none() {
            status.server_key_fingerprint = key_store
                .load_server_public_key()
                .await
                .map(|key| fingerprint(&key));
        }
        DebugReport {
            version: version::get_version_string(),
            checked_at: Utc::now(),
            status,
        }
    }

    /// Seal `data` for the server exactly as a request body would be.
    /// Runs the handshake first if it has not happened yet.
    pub async fn encrypt(&self, data: &Value) -> Result<EncryptedEnvelope, CryptoError> {
        if !self.session.ensure_handshake().await {
            return Err(CryptoError::MissingKey {
                key_type: "server_public_key (encryption not negotiated)".to_string(),
            });
        }
        let envelope = self.session.crypto().encrypt_object(data).await?;
        debug!("🧪 Debug encrypt produced {} byte ciphertext", envelope.ciphertext.len());
        Ok(envelope)
    }

    /// Open an envelope addressed to this client, e.g. one copied from a
    /// captured response.
    pub async fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Value, CryptoError> {
        let crypto = self.session.crypto();
        crypto.initialize().await?;
        crypto.decrypt_object(envelope).await
    }
}
