// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption Session
//!
//! Per-client handshake state machine:
//!
//! ```text
//! NotStarted --ensure_handshake()--> InProgress --> Completed { enabled }
//! ```
//!
//! Only the first caller performs network I/O; everyone arriving while the
//! handshake is in flight awaits the same shared future. Every failure
//! (initialization, network, timeout, malformed response, server refusal)
//! completes with `enabled = false`, so the client keeps working in plaintext.
//! Once completed, the outcome is reused until [`EncryptionSession::reset`].

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::handshake::{HandshakeError, HandshakeExchange, HandshakeResponse};
use crate::crypto::keys::{decode_key, encode, fingerprint};
use crate::crypto::CryptoEngine;

type PendingHandshake = Shared<BoxFuture<'static, bool>>;

enum HandshakePhase {
    NotStarted,
    InProgress(PendingHandshake),
    Completed { enabled: bool },
}

struct SessionState {
    /// Bumped on every reset so a handshake that straddles a reset cannot
    /// overwrite the fresh state.
    generation: u64,
    phase: HandshakePhase,
}

struct SessionInner {
    crypto: Arc<CryptoEngine>,
    exchange: Arc<dyn HandshakeExchange>,
    handshake_timeout: Duration,
    state: Mutex<SessionState>,
}

/// Snapshot of the encryption state, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionStatus {
    pub enabled: bool,
    pub handshake_complete: bool,
    pub handshake_attempted: bool,
    pub in_flight: bool,
    pub has_keys: bool,
    pub has_session_key: bool,
    pub client_public_key: Option<String>,
    pub server_key_fingerprint: Option<String>,
    pub negotiated_before: bool,
}

#[derive(Clone)]
pub struct EncryptionSession {
    inner: Arc<SessionInner>,
}

impl EncryptionSession {
    pub fn new(
        crypto: Arc<CryptoEngine>,
        exchange: Arc<dyn HandshakeExchange>,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                crypto,
                exchange,
                handshake_timeout,
                state: Mutex::new(SessionState {
                    generation: 0,
                    phase: HandshakePhase::NotStarted,
                }),
            }),
        }
    }

    pub fn crypto(&self) -> &Arc<CryptoEngine> {
        &self.inner.crypto
    }

    /// Run the handshake once and return whether encryption is active.
    pub async fn ensure_handshake(&self) -> bool {
        let pending = {
            let mut state = self.inner.state.lock().await;
            match &state.phase {
                HandshakePhase::Completed { enabled } => return *enabled,
                HandshakePhase::InProgress(pending) => pending.clone(),
                HandshakePhase::NotStarted => {
                    let inner = Arc::clone(&self.inner);
                    let generation = state.generation;
                    let pending = async move { inner.run_handshake(generation).await }
                        .boxed()
                        .shared();
                    state.phase = HandshakePhase::InProgress(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// True only once a handshake has completed with encryption enabled.
    /// Never starts a handshake.
    pub async fn is_enabled(&self) -> bool {
        matches!(
            self.inner.state.lock().await.phase,
            HandshakePhase::Completed { enabled: true }
        )
    }

    pub async fn status(&self) -> EncryptionStatus {
        let (enabled, handshake_complete, handshake_attempted, in_flight) = {
            let state = self.inner.state.lock().await;
            match state.phase {
                HandshakePhase::NotStarted => (false, false, false, false),
                HandshakePhase::InProgress(_) => (false, false, true, true),
                HandshakePhase::Completed { enabled } => (enabled, true, true, false),
            }
        };
        let crypto = &self.inner.crypto;
        EncryptionStatus {
            enabled,
            handshake_complete,
            handshake_attempted,
            in_flight,
            has_keys: crypto.has_keys().await,
            has_session_key: crypto.has_session_key().await,
            client_public_key: crypto.public_key_base64().await,
            server_key_fingerprint: crypto.server_public_key().await.map(|k| fingerprint(&k)),
            negotiated_before: crypto.key_store().load_negotiated_hint().await,
        }
    }

    /// Logout: forget the handshake outcome and the session key. The client
    /// key pair and server key stay; the next request re-runs the handshake.
    pub async fn reset(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.generation += 1;
            state.phase = HandshakePhase::NotStarted;
        }
        self.inner.crypto.clear_session().await;
        info!("🔄 Encryption session reset");
    }

    /// Explicit reset: like [`reset`](Self::reset) but also destroys the client
    /// key pair so a new one is generated.
    pub async fn reset_keys(&self) {
        self.reset().await;
        self.inner.crypto.reset().await;
    }
}

impl SessionInner {
    async fn run_handshake(self: Arc<Self>, generation: u64) -> bool {
        let enabled = self.perform_handshake().await;

        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.phase = HandshakePhase::Completed { enabled };
        } else {
            debug!("Discarding handshake result from a previous session generation");
        }
        enabled
    }

    async fn perform_handshake(&self) -> bool {
        let client_public_key = match self.crypto.initialize().await {
            Ok(key) => key,
            Err(e) => {
                warn!("⚠️  Encryption initialization failed, using plaintext: {}", e);
                return false;
            }
        };

        let encoded = encode(&client_public_key);
        let exchange = self.exchange.exchange(&encoded);
        let response = match tokio::time::timeout(self.handshake_timeout, exchange).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("⚠️  Encryption handshake failed, using plaintext: {}", e);
                return false;
            }
            Err(_) => {
                warn!(
                    "⚠️  Encryption handshake failed, using plaintext: {}",
                    HandshakeError::Timeout(self.handshake_timeout)
                );
                return false;
            }
        };

        match self.apply_response(response).await {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!("⚠️  Encryption handshake failed, using plaintext: {}", e);
                false
            }
        }
    }

    async fn apply_response(&self, response: HandshakeResponse) -> Result<bool, HandshakeError> {
        if !response.success {
            return Err(HandshakeError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "server reported failure".to_string()),
            ));
        }
        let data = response
            .data
            .ok_or_else(|| HandshakeError::Malformed("missing data".to_string()))?;

        if !data.encryption_enabled {
            info!("🔓 Server has encryption disabled, using plaintext");
            return Ok(false);
        }

        let encoded = data
            .server_public_key
            .ok_or_else(|| HandshakeError::Malformed("missing serverPublicKey".to_string()))?;
        let server_key = decode_key(&encoded, "server_public_key")
            .map_err(|e| HandshakeError::Malformed(e.to_string()))?;

        self.crypto.set_server_public_key(server_key).await;

        if let Some(sealed) = data.encrypted_session_key {
            match self.crypto.decrypt_string(&sealed).await {
                Ok(key) => match decode_key(&key, "session_key") {
                    Ok(key) => self.crypto.set_session_key(key).await,
                    Err(e) => warn!("⚠️  Ignoring invalid session key from server: {}", e),
                },
                Err(e) => warn!("⚠️  Could not open session key from server: {}", e),
            }
        }

        if let Err(e) = self.crypto.key_store().save_negotiated_hint(true).await {
            warn!("⚠️  Failed to persist encryption hint: {}", e);
        }

        info!(
            "🔐 Encryption handshake complete (server key {})",
            fingerprint(&server_key)
        );
        Ok(true)
    }
}
