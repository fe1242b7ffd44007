// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod crypto;
pub mod debug;
pub mod session;
pub mod storage;
pub mod transport;
pub mod version;

// Re-export main types
pub use config::{ClientConfig, ConfigError};
pub use crypto::{CryptoEngine, CryptoError, EncryptedBody, EncryptedEnvelope, KeyPair};
pub use debug::DebugConsole;
pub use session::{EncryptionSession, EncryptionStatus, HandshakeExchange, HttpHandshakeExchange};
pub use storage::{FileKeyValueStore, KeyStore, KeyValueStore, MemoryKeyValueStore, StorageError};
pub use transport::{ApiClient, ApiResponse, AuthEvent, TransportError};
