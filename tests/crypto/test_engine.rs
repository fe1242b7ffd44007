// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use e2e_api_client::crypto::{generate_key_pair, open_object, seal_object, CryptoEngine, CryptoError};
use e2e_api_client::storage::{FileKeyValueStore, KeyStore, MemoryKeyValueStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn memory_engine() -> Arc<CryptoEngine> {
    Arc::new(CryptoEngine::new(KeyStore::new(Arc::new(
        MemoryKeyValueStore::new(),
    ))))
}

#[tokio::test]
async fn test_concurrent_initialize_creates_one_key_pair() {
    let engine = memory_engine();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.initialize().await.unwrap() })
        })
        .collect();

    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.unwrap());
    }
    assert!(keys.windows(2).all(|w| w[0] == w[1]));

    let stored = engine.key_store().load_key_pair().await.unwrap();
    assert_eq!(stored.public_key, keys[0]);
}

#[tokio::test]
async fn test_key_pair_survives_restart() {
    let dir = TempDir::new().unwrap();
    let server = generate_key_pair();

    let first = CryptoEngine::new(KeyStore::new(Arc::new(FileKeyValueStore::new(dir.path()))));
    let public_key = first.initialize().await.unwrap();
    first.set_server_public_key(server.public_key).await;
    drop(first);

    let second = CryptoEngine::new(KeyStore::new(Arc::new(FileKeyValueStore::new(dir.path()))));
    assert_eq!(second.initialize().await.unwrap(), public_key);
    assert_eq!(second.server_public_key().await, Some(server.public_key));
    assert!(second.has_keys().await);
}

#[tokio::test]
async fn test_engine_talks_to_server() {
    let engine = memory_engine();
    let server = generate_key_pair();
    let client_pk = engine.initialize().await.unwrap();
    engine.set_server_public_key(server.public_key).await;

    let request = json!({"studentId": "s1", "question": "why?"});
    let envelope = engine.encrypt_object(&request).await.unwrap();
    let seen: Value = open_object(&envelope, &server.secret_key).unwrap();
    assert_eq!(seen, request);

    let reply = json!({"success": true, "data": {"id": "d1"}});
    let sealed = seal_object(&reply, &client_pk, &server).unwrap();
    let opened: Value = engine.decrypt_object(&sealed).await.unwrap();
    assert_eq!(opened, reply);
}

#[tokio::test]
async fn test_encrypt_without_server_key() {
    let engine = memory_engine();
    engine.initialize().await.unwrap();
    assert!(!engine.has_keys().await);

    let err = engine.encrypt_string("x").await.unwrap_err();
    assert!(matches!(err, CryptoError::MissingKey { .. }));
}

#[tokio::test]
async fn test_session_key_lifecycle() {
    let engine = memory_engine();
    engine.initialize().await.unwrap();

    assert!(engine.encrypt_with_session("x").await.is_err());
    engine.generate_session_key().await;
    assert!(engine.has_session_key().await);

    let sealed = engine.encrypt_with_session("quiz answers").await.unwrap();
    assert_eq!(engine.decrypt_with_session(&sealed).await.unwrap(), "quiz answers");

    engine.clear_session().await;
    assert!(!engine.has_session_key().await);
    assert!(engine.key_store().load_session_key().await.is_none());
    // Key pair untouched by logout
    assert!(engine.key_pair().await.is_some());
}

#[tokio::test]
async fn test_reset_generates_new_key_pair() {
    let engine = memory_engine();
    let before = engine.initialize().await.unwrap();
    engine.reset().await;
    assert!(engine.key_pair().await.is_none());

    let after = engine.initialize().await.unwrap();
    assert_ne!(before, after);
}
