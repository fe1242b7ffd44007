// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! API client
//!
//! The HTTP pipeline application code talks to. Every call goes through the
//! [`EncryptionInterceptor`] on the way out and on the way back, carries the
//! bearer token, and gets central 401 handling (terminal codes end the
//! session, anything else refreshes once and retries).

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::auth::{auth_error_code, AuthEvent, AuthManager};
use super::error::TransportError;
use super::interceptor::{EncryptionInterceptor, CLIENT_PUBLIC_KEY_HEADER};
use crate::config::ClientConfig;
use crate::crypto::CryptoEngine;
use crate::session::{EncryptionSession, EncryptionStatus, HttpHandshakeExchange};
use crate::storage::{FileKeyValueStore, KeyStore};

/// Status and (decrypted) JSON body of a completed call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Body of a 2xx response, otherwise `TransportError::Status`
    pub fn into_result(self) -> Result<Value, TransportError> {
        if self.status.is_success() {
            return Ok(self.body);
        }
        let message = error_message(&self.body)
            .or_else(|| self.status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        Err(TransportError::Status {
            status: self.status,
            message,
            body: self.body,
        })
    }
}

fn error_message(body: &Value) -> Option<String> {
    body.get("message")
        .or_else(|| body.get("error").and_then(|e| e.get("message")))
        .or_else(|| body.get("error").filter(|e| e.is_string()))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Empty bodies become `null`, non-JSON bodies a JSON string.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    session: EncryptionSession,
    interceptor: EncryptionInterceptor,
    auth: Arc<AuthManager>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, key_store: KeyStore) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        let exchange = HttpHandshakeExchange::new(
            http.clone(),
            config.endpoint(&config.handshake_path),
            config.handshake_timeout,
        );
        let crypto = Arc::new(CryptoEngine::new(key_store));
        let session = EncryptionSession::new(crypto, Arc::new(exchange), config.handshake_timeout);

        Ok(Self::with_session(config, http, session))
    }

    /// Client whose keys live in files under `config.key_dir`
    pub fn from_config(config: ClientConfig) -> Result<Self, TransportError> {
        let key_store = KeyStore::new(Arc::new(FileKeyValueStore::new(config.key_dir.clone())));
        Self::new(config, key_store)
    }

    /// Build around an existing session, e.g. one using a custom handshake
    /// exchange. Tokens share the session's key store.
    pub fn with_session(
        config: ClientConfig,
        http: reqwest::Client,
        session: EncryptionSession,
    ) -> Self {
        let config = Arc::new(config);
        let key_store = session.crypto().key_store().clone();
        let auth = Arc::new(AuthManager::new(http.clone(), Arc::clone(&config), key_store));
        let interceptor = EncryptionInterceptor::new(session.clone(), Arc::clone(&config));
        Self {
            http,
            config,
            session,
            interceptor,
            auth,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &EncryptionSession {
        &self.session
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    /// Load or create the client keys and run the handshake. Never fails; the
    /// result says whether encryption is active.
    pub async fn initialize(&self) -> bool {
        if let Err(e) = self.session.crypto().initialize().await {
            warn!("⚠️  Key initialization failed, continuing without encryption: {}", e);
        }
        let enabled = self.session.ensure_handshake().await;
        info!(
            "🚀 API client ready ({}), encryption {}",
            self.config.base_url,
            if enabled { "enabled" } else { "disabled" }
        );
        enabled
    }

    pub async fn status(&self) -> EncryptionStatus {
        self.session.status().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }

    pub async fn login_with_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        self.auth.set_tokens(access_token, refresh_token).await;
        info!("🔐 Tokens stored");
    }

    /// Drop tokens and the encryption session. The client key pair is kept.
    pub async fn logout(&self) {
        self.auth.clear_tokens().await;
        self.session.reset().await;
        info!("👋 Logged out");
    }

    /// Destroy every stored key; a new key pair is generated on next use.
    pub async fn reset_encryption(&self) {
        self.session.reset_keys().await;
    }

    /// Send a request through the full pipeline. Any status is returned as an
    /// [`ApiResponse`], except 401s that end the session. A 401 on a call
    /// without a bearer token, or with no refresh token stored, is returned
    /// unchanged.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, TransportError> {
        let token = self.auth.access_token().await;
        let response = self
            .send_once(&method, path, body.clone(), token.as_deref())
            .await?;

        if response.status != StatusCode::UNAUTHORIZED || self.is_refresh_path(path) {
            return Ok(response);
        }

        if let Some(code) = auth_error_code(&response.body) {
            if self.config.is_terminal_auth_code(&code) {
                self.terminate(&code).await;
                return Err(TransportError::SessionTerminated { code });
            }
        }

        // Anonymous calls (e.g. a failed login) get the server's 401 as is
        if token.is_none() || !self.auth.has_refresh_token().await {
            debug!("🔒 {} {} returned 401 with nothing to refresh", method, path);
            return Ok(response);
        }

        debug!("🔁 {} {} returned 401, refreshing token", method, path);
        let token = match self.auth.refresh_after(token.as_deref()).await {
            Ok(token) => token,
            Err(e) => {
                self.terminate("REFRESH_FAILED").await;
                return Err(match e {
                    TransportError::Unauthorized(_) => e,
                    other => TransportError::Unauthorized(other.to_string()),
                });
            }
        };

        self.send_once(&method, path, body, Some(&token)).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        self.call(Method::GET, path, None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        self.call(Method::DELETE, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.call(Method::POST, path, Some(body)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.call(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.call(Method::PATCH, path, Some(body)).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, TransportError> {
        let body = self.request(method, path, body).await?.into_result()?;
        Ok(serde_json::from_value(body)?)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let outgoing = self.interceptor.prepare(method, path, body).await;

        let mut builder = self.http.request(method.clone(), self.config.endpoint(path));
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(public_key) = &outgoing.client_public_key {
            builder = builder.header(CLIENT_PUBLIC_KEY_HEADER, public_key);
        }
        if let Some(body) = &outgoing.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(TransportError::from_reqwest)?;

        let body = self
            .interceptor
            .decode_response(path, parse_body(&bytes))
            .await
            .map_err(TransportError::Decryption)?;

        debug!(
            "📡 {} {} -> {} (encrypted request: {})",
            method, path, status, outgoing.body_encrypted
        );
        Ok(ApiResponse { status, body })
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        !self.config.refresh_path.is_empty() && path.ends_with(self.config.refresh_path.as_str())
    }

    async fn terminate(&self, reason: &str) {
        warn!("🚫 Session terminated ({}), clearing tokens and encryption state", reason);
        self.auth.clear_tokens().await;
        self.session.reset().await;
        self.auth.notify_terminated(reason);
    }
}
