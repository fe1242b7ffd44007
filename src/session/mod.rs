// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod encryption_session;
pub mod handshake;

pub use encryption_session::{EncryptionSession, EncryptionStatus};
pub use handshake::{
    HandshakeData, HandshakeError, HandshakeExchange, HandshakeRequest, HandshakeResponse,
    HttpHandshakeExchange,
};
