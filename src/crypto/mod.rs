// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Encryption Module
//!
//! This module implements the client side of the API encryption layer:
//!
//! - **Keys**: X25519 key pairs and 32-byte session keys, base64 on the wire
//! - **NaCl**: `box` (X25519 + XSalsa20-Poly1305) and `secretbox` primitives
//! - **Envelope**: the `{encrypted, payload}` body shape
//! - **Engine**: stateful service holding the client, server and session keys
//!
//! ## Security Considerations
//!
//! - The client secret key never leaves the process or its key store
//! - Nonces are random per encryption operation
//! - Decryption failures are errors, never partial plaintext
//! - The server public key is not pinned; the handshake relies on TLS
//!
//! ## Protocol Flow
//!
//! 1. Client loads or generates its key pair
//! 2. Client posts its public key to the handshake endpoint
//! 3. Server answers with its public key and whether encryption is enabled
//! 4. Request bodies are sealed for the server key; responses are sealed for
//!    the client key and opened transparently

pub mod engine;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod nacl;

pub use engine::{open_object, seal_object, CryptoEngine};
pub use envelope::{EncryptedBody, EncryptedEnvelope, SymmetricEnvelope};
pub use error::CryptoError;
pub use keys::{KeyPair, KEY_LENGTH};
pub use nacl::{
    decrypt_asymmetric, decrypt_symmetric, encrypt_asymmetric, encrypt_symmetric,
    generate_key_pair, generate_session_key, hash, random_bytes, random_id, NONCE_LENGTH,
};
