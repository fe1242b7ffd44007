// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Token storage and refresh
//!
//! Bearer tokens live in the key store next to the encryption keys. A refresh
//! is single-flight: concurrent 401s all await the one in-flight refresh call.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use super::error::TransportError;
use crate::config::ClientConfig;
use crate::storage::{KeyStore, ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT};

type PendingRefresh = Shared<BoxFuture<'static, Result<String, TransportError>>>;

/// Auth lifecycle notifications. A UI listens for `SessionTerminated` to send
/// the user back to sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    TokensRefreshed,
    SessionTerminated { reason: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    success: bool,
    data: Option<TokenPair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Extract the error code of an (already decrypted) error body: top-level
/// `code`, else `error.code`.
pub fn auth_error_code(body: &Value) -> Option<String> {
    body.get("code")
        .or_else(|| body.get("error").and_then(|e| e.get("code")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub struct AuthManager {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    key_store: KeyStore,
    access_token: RwLock<Option<String>>,
    pending: Mutex<Option<PendingRefresh>>,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthManager {
    pub fn new(http: reqwest::Client, config: Arc<ClientConfig>, key_store: KeyStore) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            http,
            config,
            key_store,
            access_token: RwLock::new(None),
            pending: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Current access token, falling back to the stored one.
    pub async fn access_token(&self) -> Option<String> {
        if let Some(token) = self.access_token.read().await.clone() {
            return Some(token);
        }
        let stored = self.key_store.load_token(ACCESS_TOKEN_SLOT).await?;
        *self.access_token.write().await = Some(stored.clone());
        Some(stored)
    }

    pub async fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        *self.access_token.write().await = Some(access_token.to_string());
        if let Err(e) = self.key_store.save_token(ACCESS_TOKEN_SLOT, access_token).await {
            warn!("⚠️  Failed to persist access token: {}", e);
        }
        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.key_store.save_token(REFRESH_TOKEN_SLOT, refresh_token).await {
                warn!("⚠️  Failed to persist refresh token: {}", e);
            }
        }
    }

    pub async fn has_refresh_token(&self) -> bool {
        self.key_store.load_token(REFRESH_TOKEN_SLOT).await.is_some()
    }

    pub async fn clear_tokens(&self) {
        *self.access_token.write().await = None;
        for slot in [ACCESS_TOKEN_SLOT, REFRESH_TOKEN_SLOT] {
            if let Err(e) = self.key_store.clear(slot).await {
                warn!("⚠️  Failed to clear {}: {}", slot, e);
            }
        }
    }

    pub fn notify_terminated(&self, reason: impl Into<String>) {
        // No receivers is fine
        let _ = self.events.send(AuthEvent::SessionTerminated {
            reason: reason.into(),
        });
    }

    /// Obtain a fresh access token after a 401 on a request sent with
    /// `used_token`. If another caller already refreshed past that token, the
    /// new token is returned without another network call.
    pub async fn refresh_after(
        self: &Arc<Self>,
        used_token: Option<&str>,
    ) -> Result<String, TransportError> {
        if let Some(current) = self.access_token.read().await.clone() {
            if used_token.is_some_and(|used| used != current) {
                return Ok(current);
            }
        }
        self.refresh().await
    }

    /// Single-flight refresh.
    pub async fn refresh(self: &Arc<Self>) -> Result<String, TransportError> {
        let pending = {
            let mut slot = self.pending.lock().await;
            match slot.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let this = Arc::clone(self);
                    let pending = async move {
                        let result = this.perform_refresh().await;
                        *this.pending.lock().await = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    async fn perform_refresh(&self) -> Result<String, TransportError> {
        let refresh_token = self
            .key_store
            .load_token(REFRESH_TOKEN_SLOT)
            .await
            .ok_or_else(|| TransportError::Unauthorized("no refresh token".to_string()))?;

        let response = self
            .http
            .post(self.config.endpoint(&self.config.refresh_path))
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Unauthorized(format!(
                "token refresh failed: HTTP {}",
                status
            )));
        }

        let parsed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Serialization(e.to_string()))?;
        let tokens = match parsed.data {
            Some(tokens) if parsed.success => tokens,
            _ => {
                return Err(TransportError::Unauthorized(
                    "token refresh rejected".to_string(),
                ))
            }
        };

        self.set_tokens(&tokens.access_token, tokens.refresh_token.as_deref())
            .await;
        info!("🔑 Access token refreshed");
        let _ = self.events.send(AuthEvent::TokensRefreshed);
        Ok(tokens.access_token)
    }
}
