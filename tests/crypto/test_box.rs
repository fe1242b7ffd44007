// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! NaCl box round trips between two independent key pairs

use e2e_api_client::crypto::keys::{decode, encode};
use e2e_api_client::crypto::{
    decrypt_asymmetric, encrypt_asymmetric, generate_key_pair, open_object, seal_object,
    CryptoError, EncryptedEnvelope, NONCE_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Doubt {
    student_id: String,
    question: String,
    tags: Vec<String>,
}

/// Every copy of `field` with exactly one byte flipped
fn single_byte_flips(field: &str) -> Vec<String> {
    let bytes = decode(field).unwrap();
    (0..bytes.len())
        .map(|i| {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            encode(&tampered)
        })
        .collect()
}

#[test]
fn test_roundtrip_both_directions() {
    let client = generate_key_pair();
    let server = generate_key_pair();

    let to_server = encrypt_asymmetric("hello server", &server.public_key, &client).unwrap();
    assert_eq!(to_server.public_key, client.public_key_base64());
    assert_eq!(
        decrypt_asymmetric(&to_server, &server.secret_key).unwrap(),
        "hello server"
    );

    let to_client = encrypt_asymmetric("hello client", &client.public_key, &server).unwrap();
    assert_eq!(
        decrypt_asymmetric(&to_client, &client.secret_key).unwrap(),
        "hello client"
    );
}

#[test]
fn test_object_roundtrip_law() {
    let client = generate_key_pair();
    let server = generate_key_pair();
    let doubt = Doubt {
        student_id: "s1".to_string(),
        question: "why does the sky look blue? ☀️".to_string(),
        tags: vec!["physics".to_string(), "optics".to_string()],
    };

    let envelope = seal_object(&doubt, &server.public_key, &client).unwrap();
    let opened: Doubt = open_object(&envelope, &server.secret_key).unwrap();
    assert_eq!(opened, doubt);
}

#[test]
fn test_nonces_are_unique() {
    let client = generate_key_pair();
    let server = generate_key_pair();

    let mut nonces = HashSet::new();
    let mut ciphertexts = HashSet::new();
    for _ in 0..200 {
        let envelope = encrypt_asymmetric("same message", &server.public_key, &client).unwrap();
        assert_eq!(decode(&envelope.nonce).unwrap().len(), NONCE_LENGTH);
        nonces.insert(envelope.nonce);
        ciphertexts.insert(envelope.ciphertext);
    }
    assert_eq!(nonces.len(), 200);
    assert_eq!(ciphertexts.len(), 200);
}

#[test]
fn test_tampered_ciphertext_is_rejected() {
    let client = generate_key_pair();
    let server = generate_key_pair();
    let envelope = encrypt_asymmetric("pay 10", &server.public_key, &client).unwrap();

    let flips = single_byte_flips(&envelope.ciphertext);
    assert!(!flips.is_empty());
    for ciphertext in flips {
        let tampered = EncryptedEnvelope {
            ciphertext,
            ..envelope.clone()
        };
        let err = decrypt_asymmetric(&tampered, &server.secret_key).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed { .. }));
    }
}

#[test]
fn test_tampered_nonce_is_rejected() {
    let client = generate_key_pair();
    let server = generate_key_pair();
    let envelope = encrypt_asymmetric("pay 10", &server.public_key, &client).unwrap();

    let flips = single_byte_flips(&envelope.nonce);
    assert_eq!(flips.len(), NONCE_LENGTH);
    for nonce in flips {
        let tampered = EncryptedEnvelope {
            nonce,
            ..envelope.clone()
        };
        let err = decrypt_asymmetric(&tampered, &server.secret_key).unwrap_err();
        assert!(err.is_decryption_failure());
    }
}

#[test]
fn test_wrong_recipient_is_rejected() {
    let client = generate_key_pair();
    let server = generate_key_pair();
    let eavesdropper = generate_key_pair();
    let envelope = encrypt_asymmetric("secret", &server.public_key, &client).unwrap();

    assert!(decrypt_asymmetric(&envelope, &eavesdropper.secret_key).is_err());
}

#[test]
fn test_malformed_fields_are_hard_errors() {
    let client = generate_key_pair();
    let server = generate_key_pair();
    let good = encrypt_asymmetric("x", &server.public_key, &client).unwrap();

    let short_nonce = EncryptedEnvelope {
        nonce: encode(&[0u8; 12]),
        ..good.clone()
    };
    assert!(matches!(
        decrypt_asymmetric(&short_nonce, &server.secret_key),
        Err(CryptoError::InvalidNonce {
            expected_size: 24,
            actual_size: 12
        })
    ));

    let bad_key = EncryptedEnvelope {
        public_key: encode(&[7u8; 16]),
        ..good.clone()
    };
    assert!(matches!(
        decrypt_asymmetric(&bad_key, &server.secret_key),
        Err(CryptoError::InvalidKey { .. })
    ));

    let not_base64 = EncryptedEnvelope {
        ciphertext: "***".to_string(),
        ..good
    };
    assert!(matches!(
        decrypt_asymmetric(&not_base64, &server.secret_key),
        Err(CryptoError::InvalidPayload { .. })
    ));
}
