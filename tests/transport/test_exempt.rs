// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::mock_server::{HandshakeMode, MockServer};
use serde_json::{json, Value};

#[tokio::test]
async fn test_payment_never_encrypted_nor_handshaken() {
    let server = MockServer::start(HandshakeMode::Enabled).await;
    let client = server.client();

    let body = json!({"plan": "pro", "amount": 499});
    let reply: Value = client.post("/payment/create-order", &body).await.unwrap();
    assert_eq!(reply["data"]["echo"], body);

    let seen = server.state.requests_to("/payment/create-order");
    assert!(!seen[0].was_encrypted());
    assert_eq!(seen[0].client_public_key, None);
    assert_eq!(server.state.handshakes(), 0);
}

#[tokio::test]
async fn test_payment_stays_plain_after_handshake() {
    let server = MockServer::start(HandshakeMode::Enabled).await;
    let client = server.client();
    assert!(client.initialize().await);

    let _: Value = client
        .post("/payment/create-order", &json!({"plan": "basic"}))
        .await
        .unwrap();

    let seen = server.state.requests_to("/payment/create-order");
    assert!(!seen[0].was_encrypted());
    assert_eq!(seen[0].client_public_key, None);
}
