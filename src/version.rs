// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the E2E API client

/// Full version string with feature description
pub const VERSION: &str = "v1.0.0-nacl-box-2025-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "nacl-box",
    "nacl-secretbox",
    "single-flight-handshake",
    "plaintext-fallback",
    "encrypted-error-bodies",
    "single-flight-token-refresh",
    "durable-key-store",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("E2E API Client {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get full version info for diagnostics output
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "build": VERSION,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
