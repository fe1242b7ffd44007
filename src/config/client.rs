// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Error codes on a 401 that end the session instead of attempting a refresh
pub const TERMINAL_AUTH_CODES: &[&str] = &["SESSION_TERMINATED", "INVALID_TOKEN", "NO_TOKEN"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub handshake_path: String,
    pub public_key_path: String,
    pub refresh_path: String,
    /// Path fragments never encrypted in either direction
    pub exempt_paths: Vec<String>,
    #[serde(with = "millis")]
    pub handshake_timeout: Duration,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    pub key_dir: PathBuf,
    pub terminal_auth_codes: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".to_string(),
            handshake_path: "/encryption/handshake".to_string(),
            public_key_path: "/encryption/public-key".to_string(),
            refresh_path: "/auth/refresh-token".to_string(),
            exempt_paths: vec![
                "/encryption/handshake".to_string(),
                "/encryption/public-key".to_string(),
                "/payment".to_string(),
                "/subscription".to_string(),
            ],
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            key_dir: PathBuf::from(".e2e-keys"),
            terminal_auth_codes: TERMINAL_AUTH_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `E2E_*` environment variables (a `.env` file is
    /// loaded first when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(url) = env::var("E2E_API_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(path) = env::var("E2E_HANDSHAKE_PATH") {
            config.handshake_path = path;
        }
        if let Ok(path) = env::var("E2E_REFRESH_PATH") {
            config.refresh_path = path;
        }
        if let Ok(paths) = env::var("E2E_EXEMPT_PATHS") {
            config.exempt_paths = paths
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Ok(ms) = env::var("E2E_HANDSHAKE_TIMEOUT_MS") {
            config.handshake_timeout = parse_millis("E2E_HANDSHAKE_TIMEOUT_MS", &ms)?;
        }
        if let Ok(ms) = env::var("E2E_REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("E2E_REQUEST_TIMEOUT_MS", &ms)?;
        }
        if let Ok(dir) = env::var("E2E_KEY_DIR") {
            config.key_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "handshake_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Full URL for an API path
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn is_exempt(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.exempt_paths
            .iter()
            .any(|fragment| !fragment.is_empty() && path.contains(fragment.as_str()))
            || (!self.refresh_path.is_empty() && path.contains(self.refresh_path.as_str()))
    }

    pub fn is_terminal_auth_code(&self, code: &str) -> bool {
        self.terminal_auth_codes.iter().any(|c| c == code)
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
