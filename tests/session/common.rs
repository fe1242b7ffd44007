// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use e2e_api_client::crypto::{CryptoEngine, KeyPair};
use e2e_api_client::session::{
    EncryptionSession, HandshakeError, HandshakeExchange, HandshakeResponse,
};
use e2e_api_client::storage::{KeyStore, MemoryKeyValueStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted exchange that counts calls and can stall before answering
pub struct ScriptedExchange {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub response: Result<HandshakeResponse, HandshakeError>,
}

impl ScriptedExchange {
    pub fn enabled(server: &KeyPair, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            response: Ok(HandshakeResponse::enabled(server.public_key_base64())),
        })
    }

    pub fn answering(
        response: Result<HandshakeResponse, HandshakeError>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            response,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HandshakeExchange for ScriptedExchange {
    async fn exchange(&self, _client_public_key: &str) -> Result<HandshakeResponse, HandshakeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.response.clone()
    }
}

pub fn session_with(exchange: Arc<ScriptedExchange>, timeout: Duration) -> EncryptionSession {
    let crypto = Arc::new(CryptoEngine::new(KeyStore::new(Arc::new(
        MemoryKeyValueStore::new(),
    ))));
    EncryptionSession::new(crypto, exchange, timeout)
}
