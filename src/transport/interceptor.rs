// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Encryption Interceptor
//!
//! Request/response transforms applied around every API call.
//!
//! Outgoing: when [`should_encrypt`](EncryptionInterceptor::should_encrypt)
//! holds, the client public key goes into `X-Client-Public-Key` and bodies of
//! POST/PUT/PATCH requests are replaced by `{encrypted: true, payload}`.
//! GET-style requests only carry the header, so the server can encrypt its
//! answer.
//!
//! Incoming: any body shaped `{encrypted: true, payload}` is opened and
//! replaced by the decrypted JSON, for success and error statuses alike.

use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::crypto::{CryptoError, EncryptedBody};
use crate::session::EncryptionSession;

pub const CLIENT_PUBLIC_KEY_HEADER: &str = "X-Client-Public-Key";

/// Request after the outgoing transform
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    /// Value for `X-Client-Public-Key`, present only when encrypting
    pub client_public_key: Option<String>,
    pub body: Option<Value>,
    /// The body was replaced by an encrypted envelope
    pub body_encrypted: bool,
}

impl OutgoingRequest {
    fn plain(body: Option<Value>) -> Self {
        Self {
            client_public_key: None,
            body,
            body_encrypted: false,
        }
    }
}

pub fn method_has_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

#[derive(Clone)]
pub struct EncryptionInterceptor {
    session: EncryptionSession,
    config: Arc<ClientConfig>,
}

impl EncryptionInterceptor {
    pub fn new(session: EncryptionSession, config: Arc<ClientConfig>) -> Self {
        Self { session, config }
    }

    pub fn session(&self) -> &EncryptionSession {
        &self.session
    }

    /// Exempt paths never trigger the handshake and are never encrypted.
    pub async fn should_encrypt(&self, path: &str) -> bool {
        if self.config.is_exempt(path) {
            return false;
        }
        if !self.session.ensure_handshake().await {
            return false;
        }
        self.session.crypto().has_keys().await
    }

    pub async fn prepare(&self, method: &Method, path: &str, body: Option<Value>) -> OutgoingRequest {
        if !self.should_encrypt(path).await {
            return OutgoingRequest::plain(body);
        }

        let crypto = self.session.crypto();
        let Some(client_public_key) = crypto.public_key_base64().await else {
            return OutgoingRequest::plain(body);
        };

        match body {
            Some(body) if method_has_body(method) => match crypto.encrypt_object(&body).await {
                Ok(envelope) => {
                    debug!("🔒 Encrypted {} {} body", method, path);
                    OutgoingRequest {
                        client_public_key: Some(client_public_key),
                        body: Some(EncryptedBody::new(envelope).to_value()),
                        body_encrypted: true,
                    }
                }
                Err(e) => {
                    warn!(
                        "⚠️  Encryption unavailable for {} {}, sending plaintext: {}",
                        method, path, e
                    );
                    OutgoingRequest::plain(Some(body))
                }
            },
            body => OutgoingRequest {
                client_public_key: Some(client_public_key),
                body,
                body_encrypted: false,
            },
        }
    }

    /// Open an encrypted response body; everything else passes through.
    pub async fn decode_response(&self, path: &str, body: Value) -> Result<Value, CryptoError> {
        if self.config.is_exempt(path) {
            return Ok(body);
        }
        match EncryptedBody::detect(&body) {
            None => Ok(body),
            Some(Err(e)) => Err(e),
            Some(Ok(envelope)) => {
                let decrypted = self.session.crypto().decrypt_object::<Value>(&envelope).await?;
                debug!("🔓 Decrypted response for {}", path);
                Ok(decrypted)
            }
        }
    }
}
