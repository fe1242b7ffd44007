// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod key_store;
pub mod kv_store;

// Re-export main types for convenience
pub use key_store::{
    KeyStore, ACCESS_TOKEN_SLOT, CLIENT_KEY_PAIR_SLOT, ENCRYPTION_HINT_SLOT, REFRESH_TOKEN_SLOT,
    SERVER_PUBLIC_KEY_SLOT, SESSION_KEY_SLOT,
};
pub use kv_store::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StorageError};
