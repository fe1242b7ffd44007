// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::common::{session_with, ScriptedExchange};
use e2e_api_client::crypto::generate_key_pair;
use futures::future::join_all;
use std::time::Duration;

#[tokio::test]
async fn test_concurrent_callers_share_one_handshake() {
    let server = generate_key_pair();
    let exchange = ScriptedExchange::enabled(&server, Duration::from_millis(100));
    let session = session_with(exchange.clone(), Duration::from_secs(5));

    let callers = (0..25).map(|_| {
        let session = session.clone();
        async move { session.ensure_handshake().await }
    });
    let results = join_all(callers).await;

    assert!(results.iter().all(|enabled| *enabled));
    assert_eq!(exchange.call_count(), 1);
}

#[tokio::test]
async fn test_spawned_callers_share_one_handshake() {
    let server = generate_key_pair();
    let exchange = ScriptedExchange::enabled(&server, Duration::from_millis(50));
    let session = session_with(exchange.clone(), Duration::from_secs(5));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.ensure_handshake().await })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap());
    }
    assert_eq!(exchange.call_count(), 1);
}

#[tokio::test]
async fn test_in_flight_visible_in_status() {
    let server = generate_key_pair();
    let exchange = ScriptedExchange::enabled(&server, Duration::from_millis(200));
    let session = session_with(exchange, Duration::from_secs(5));

    let background = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_handshake().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = session.status().await;
    assert!(status.in_flight);
    assert!(status.handshake_attempted);
    assert!(!status.handshake_complete);
    assert!(!session.is_enabled().await);

    assert!(background.await.unwrap());
    let status = session.status().await;
    assert!(status.enabled && status.handshake_complete && !status.in_flight);
    assert!(status.negotiated_before);
}

#[tokio::test]
async fn test_completed_outcome_is_cached() {
    let server = generate_key_pair();
    let exchange = ScriptedExchange::enabled(&server, Duration::ZERO);
    let session = session_with(exchange.clone(), Duration::from_secs(5));

    for _ in 0..5 {
        assert!(session.ensure_handshake().await);
    }
    assert_eq!(exchange.call_count(), 1);

    session.reset().await;
    assert!(session.ensure_handshake().await);
    assert_eq!(exchange.call_count(), 2);
}

#[tokio::test]
async fn test_reset_during_handshake_does_not_resurrect_state() {
    let server = generate_key_pair();
    let exchange = ScriptedExchange::enabled(&server, Duration::from_millis(150));
    let session = session_with(exchange, Duration::from_secs(5));

    let stale = {
        let session = session.clone();
        tokio::spawn(async move { session.ensure_handshake().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    session.reset().await;

    // The first caller still gets its own answer
    assert!(stale.await.unwrap());
    // ...but it does not mark the fresh generation as completed
    assert!(!session.status().await.handshake_complete);
}
