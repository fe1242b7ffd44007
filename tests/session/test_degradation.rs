// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::common::{session_with, ScriptedExchange};
use e2e_api_client::session::{HandshakeData, HandshakeError, HandshakeResponse};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_timeout_degrades_to_plaintext() {
    let exchange = ScriptedExchange::answering(
        Ok(HandshakeResponse::disabled()),
        Duration::from_secs(30),
    );
    let session = session_with(exchange.clone(), Duration::from_millis(100));

    let started = Instant::now();
    assert!(!session.ensure_handshake().await);
    assert!(started.elapsed() < Duration::from_secs(5));

    let status = session.status().await;
    assert!(status.handshake_complete);
    assert!(!status.enabled);
    assert!(!status.negotiated_before);

    // Failure is cached like any other outcome
    assert!(!session.ensure_handshake().await);
    assert_eq!(exchange.call_count(), 1);
}

#[tokio::test]
async fn test_network_error_degrades() {
    let exchange = ScriptedExchange::answering(
        Err(HandshakeError::Network("connection refused".to_string())),
        Duration::ZERO,
    );
    let session = session_with(exchange, Duration::from_secs(1));
    assert!(!session.ensure_handshake().await);
    assert!(!session.crypto().has_keys().await);
}

#[tokio::test]
async fn test_unsuccessful_response_degrades() {
    let exchange = ScriptedExchange::answering(
        Ok(HandshakeResponse {
            success: false,
            data: None,
            message: Some("maintenance".to_string()),
        }),
        Duration::ZERO,
    );
    let session = session_with(exchange, Duration::from_secs(1));
    assert!(!session.ensure_handshake().await);
}

#[tokio::test]
async fn test_malformed_server_key_degrades() {
    for bad_key in [None, Some("%%%".to_string()), Some("AAAA".to_string())] {
        let exchange = ScriptedExchange::answering(
            Ok(HandshakeResponse {
                success: true,
                data: Some(HandshakeData {
                    server_public_key: bad_key,
                    encryption_enabled: true,
                    encrypted_session_key: None,
                }),
                message: None,
            }),
            Duration::ZERO,
        );
        let session = session_with(exchange, Duration::from_secs(1));
        assert!(!session.ensure_handshake().await);
        assert!(!session.crypto().has_keys().await);
    }
}

#[tokio::test]
async fn test_server_opt_out() {
    let exchange = ScriptedExchange::answering(Ok(HandshakeResponse::disabled()), Duration::ZERO);
    let session = session_with(exchange, Duration::from_secs(1));
    assert!(!session.ensure_handshake().await);
    let status = session.status().await;
    assert!(status.handshake_complete && !status.enabled);
    // Client keys still exist; only the server declined
    assert!(status.client_public_key.is_some());
}
