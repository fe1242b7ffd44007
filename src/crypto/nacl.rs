// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! NaCl `box` / `secretbox` Encryption
//!
//! Public-key authenticated encryption (X25519 + XSalsa20-Poly1305) and its
//! secret-key counterpart, wire compatible with tweetnacl. Every call draws a
//! fresh random 24-byte nonce from the OS RNG.

use crypto_box::{aead::Aead, Nonce, PublicKey, SalsaBox, SecretKey};
use crypto_secretbox::aead::{generic_array::GenericArray, KeyInit};
use crypto_secretbox::XSalsa20Poly1305;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha512};

use super::envelope::{EncryptedEnvelope, SymmetricEnvelope};
use super::keys::{decode, decode_key, encode, random_array, KeyPair, KEY_LENGTH};
use super::CryptoError;

/// Nonce length for both `box` and `secretbox`
pub const NONCE_LENGTH: usize = 24;

/// Poly1305 tag length; every ciphertext is at least this long
pub const TAG_LENGTH: usize = 16;

/// Generate a fresh X25519 key pair from the OS CSPRNG
pub fn generate_key_pair() -> KeyPair {
    KeyPair::from_secret_key(random_array::<KEY_LENGTH>())
}

/// Generate a random 32-byte `secretbox` key
pub fn generate_session_key() -> [u8; KEY_LENGTH] {
    random_array::<KEY_LENGTH>()
}

/// Encrypt a string for `recipient_public_key` using NaCl `box`
///
/// # Arguments
///
/// * `plaintext` - UTF-8 text to seal (usually serialized JSON)
/// * `recipient_public_key` - 32-byte X25519 public key of the receiver
/// * `own_keys` - Sender key pair; its public half travels in the envelope
///
/// # Security
///
/// A new random nonce is generated per call. Never reuse a nonce with the same
/// key pair.
pub fn encrypt_asymmetric(
    plaintext: &str,
    recipient_public_key: &[u8; KEY_LENGTH],
    own_keys: &KeyPair,
) -> Result<EncryptedEnvelope, CryptoError> {
    let salsa_box = SalsaBox::new(
        &PublicKey::from(*recipient_public_key),
        &SecretKey::from(own_keys.secret_key),
    );

    let nonce_bytes = random_array::<NONCE_LENGTH>();
    let ciphertext = salsa_box
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed {
            operation: "box".to_string(),
            reason: e.to_string(),
        })?;

    Ok(EncryptedEnvelope {
        ciphertext: encode(&ciphertext),
        nonce: encode(&nonce_bytes),
        public_key: own_keys.public_key_base64(),
    })
}

/// Decrypt a NaCl `box` envelope addressed to `own_secret_key`
///
/// The sender key is taken from the envelope itself.
///
/// # Errors
///
/// Returns error if:
/// - a field is not valid base64 (`InvalidPayload`)
/// - the nonce is not 24 bytes (`InvalidNonce`)
/// - the sender key is not 32 bytes (`InvalidKey`)
/// - the authentication tag does not verify, or the plaintext is not UTF-8
///   (`DecryptionFailed`)
pub fn decrypt_asymmetric(
    envelope: &EncryptedEnvelope,
    own_secret_key: &[u8; KEY_LENGTH],
) -> Result<String, CryptoError> {
    let sender_public_key = decode_key(&envelope.public_key, "sender_public_key")?;
    let nonce = decode_nonce(&envelope.nonce)?;
    let ciphertext = decode_ciphertext(&envelope.ciphertext)?;

    let salsa_box = SalsaBox::new(
        &PublicKey::from(sender_public_key),
        &SecretKey::from(*own_secret_key),
    );

    let plaintext = salsa_box
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed {
            operation: "box_open".to_string(),
            reason: "authentication tag mismatch or wrong key".to_string(),
        })?;

    into_utf8(plaintext, "box_open")
}

/// Encrypt a string with a 32-byte session key using NaCl `secretbox`
pub fn encrypt_symmetric(
    plaintext: &str,
    key: &[u8; KEY_LENGTH],
) -> Result<SymmetricEnvelope, CryptoError> {
    let cipher = XSalsa20Poly1305::new_from_slice(key).map_err(|e| CryptoError::InvalidKey {
        key_type: "session_key".to_string(),
        reason: e.to_string(),
    })?;

    let nonce_bytes = random_array::<NONCE_LENGTH>();
    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed {
            operation: "secretbox".to_string(),
            reason: e.to_string(),
        })?;

    Ok(SymmetricEnvelope {
        ciphertext: encode(&ciphertext),
        nonce: encode(&nonce_bytes),
    })
}

/// Decrypt a NaCl `secretbox` envelope with the session key
pub fn decrypt_symmetric(
    envelope: &SymmetricEnvelope,
    key: &[u8; KEY_LENGTH],
) -> Result<String, CryptoError> {
    let nonce = decode_nonce(&envelope.nonce)?;
    let ciphertext = decode_ciphertext(&envelope.ciphertext)?;

    let cipher = XSalsa20Poly1305::new_from_slice(key).map_err(|e| CryptoError::InvalidKey {
        key_type: "session_key".to_string(),
        reason: e.to_string(),
    })?;

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed {
            operation: "secretbox_open".to_string(),
            reason: "authentication tag mismatch or wrong key".to_string(),
        })?;

    into_utf8(plaintext, "secretbox_open")
}

/// SHA-512 digest. Deterministic, one-way; used for identifiers.
pub fn hash(data: &[u8]) -> [u8; 64] {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// Random identifier over `[A-Za-z0-9]`
pub fn random_id(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// `length` bytes from the OS RNG
pub fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn decode_nonce(value: &str) -> Result<[u8; NONCE_LENGTH], CryptoError> {
    let bytes = decode(value).map_err(|e| field_error("nonce", e))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidNonce {
            expected_size: NONCE_LENGTH,
            actual_size: bytes.len(),
        })
}

fn decode_ciphertext(value: &str) -> Result<Vec<u8>, CryptoError> {
    let bytes = decode(value).map_err(|e| field_error("ciphertext", e))?;
    if bytes.len() < TAG_LENGTH {
        return Err(CryptoError::InvalidPayload {
            field: "ciphertext".to_string(),
            reason: format!(
                "ciphertext shorter than the {}-byte authentication tag",
                TAG_LENGTH
            ),
        });
    }
    Ok(bytes)
}

fn field_error(field: &str, err: CryptoError) -> CryptoError {
    match err {
        CryptoError::InvalidPayload { reason, .. } => CryptoError::InvalidPayload {
            field: field.to_string(),
            reason,
        },
        other => other,
    }
}

fn into_utf8(plaintext: Vec<u8>, operation: &str) -> Result<String, CryptoError> {
    String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed {
        operation: operation.to_string(),
        reason: format!("decrypted data is not valid UTF-8: {}", e),
    })
}
