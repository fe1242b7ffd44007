// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::mock_server::{HandshakeMode, MockServer};
use e2e_api_client::transport::{Method, StatusCode};
use e2e_api_client::TransportError;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewDoubt<'a> {
    student_id: &'a str,
    question: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoubtReply {
    success: bool,
    data: Doubt,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Doubt {
    id: String,
    student_id: String,
    question: String,
}

#[tokio::test]
async fn test_full_encrypted_lifecycle() {
    let server = MockServer::start(HandshakeMode::Enabled).await;
    let client = server.client();

    assert!(client.initialize().await);
    assert_eq!(server.state.handshakes(), 1);

    let reply: DoubtReply = client
        .post(
            "/doubts",
            &NewDoubt {
                student_id: "s1",
                question: "why?",
            },
        )
        .await
        .unwrap();
    assert!(reply.success);
    assert_eq!(reply.data.id, "d1");
    assert_eq!(reply.data.student_id, "s1");
    assert_eq!(reply.data.question, "why?");

    let seen = server.state.requests_to("/doubts");
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert!(request.was_encrypted());
    assert!(request.raw_body.get("studentId").is_none());
    assert_eq!(
        request.plain_body,
        json!({"studentId": "s1", "question": "why?"})
    );
    assert_eq!(
        request.client_public_key,
        client.session().crypto().public_key_base64().await
    );

    // Still one handshake for the whole session
    assert_eq!(server.state.handshakes(), 1);
}

#[tokio::test]
async fn test_get_sends_header_and_gets_decrypted_reply() {
    let server = MockServer::start(HandshakeMode::Enabled).await;
    let client = server.client();

    let stats: Value = client.get("/dashboard/stats").await.unwrap();
    assert_eq!(stats["data"]["doubtsAsked"], json!(3));

    let seen = server.state.requests_to("/dashboard/stats");
    assert!(seen[0].client_public_key.is_some());
    assert_eq!(seen[0].raw_body, Value::Null);
}

#[tokio::test]
async fn test_concurrent_first_requests_share_handshake() {
    let server = MockServer::start(HandshakeMode::Enabled).await;
    let client = server.client();

    let calls = (0..10).map(|i| {
        let client = &client;
        async move {
            client
                .post::<Value, _>("/doubts", &json!({"studentId": format!("s{i}"), "question": "q"}))
                .await
        }
    });
    let results = join_all(calls).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(server.state.handshakes(), 1);
    assert!(server
        .state
        .requests_to("/doubts")
        .iter()
        .all(|r| r.was_encrypted()));
}

#[tokio::test]
async fn test_disabled_server_gets_plaintext() {
    let server = MockServer::start(HandshakeMode::Disabled).await;
    let client = server.client();

    assert!(!client.initialize().await);
    let reply: Value = client
        .post("/doubts", &json!({"studentId": "s1", "question": "why?"}))
        .await
        .unwrap();
    assert_eq!(reply["data"]["studentId"], json!("s1"));

    let seen = server.state.requests_to("/doubts");
    assert!(!seen[0].was_encrypted());
    assert_eq!(seen[0].client_public_key, None);
}

#[tokio::test]
async fn test_malformed_handshake_degrades_to_plaintext() {
    let server = MockServer::start(HandshakeMode::Malformed).await;
    let client = server.client();

    for _ in 0..3 {
        let response = client
            .request(Method::POST, "/doubts", Some(json!({"studentId": "s1", "question": "q"})))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
    }

    assert_eq!(server.state.handshakes(), 1);
    assert!(server
        .state
        .requests_to("/doubts")
        .iter()
        .all(|r| !r.was_encrypted() && r.client_public_key.is_none()));
    assert!(!client.status().await.enabled);
}

#[tokio::test]
async fn test_stalled_handshake_times_out_to_plaintext() {
    let server = MockServer::start(HandshakeMode::Stall).await;
    let client = server.client();

    let started = Instant::now();
    let reply: Value = client
        .post("/doubts", &json!({"studentId": "s1", "question": "q"}))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(reply["success"], json!(true));
    assert!(!server.state.requests_to("/doubts")[0].was_encrypted());
}

#[tokio::test]
async fn test_undecryptable_response_is_an_error() {
    let server = MockServer::start(HandshakeMode::Enabled).await;
    let client = server.client();

    let err = client.get::<Value>("/tampered").await.unwrap_err();
    match err {
        TransportError::Decryption(inner) => assert!(inner.is_decryption_failure()),
        other => panic!("expected a decryption error, got {other:?}"),
    }
}
