// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod auth;
pub mod client;
pub mod error;
pub mod interceptor;

pub use auth::{auth_error_code, AuthEvent, AuthManager};
pub use client::{ApiClient, ApiResponse};
pub use error::TransportError;
pub use interceptor::{
    method_has_body, EncryptionInterceptor, OutgoingRequest, CLIENT_PUBLIC_KEY_HEADER,
};
pub use reqwest::{Method, StatusCode};
