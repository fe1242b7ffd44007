// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::Value;

use super::ConnectionArgs;
use crate::config::ClientConfig;
use crate::crypto::{EncryptedBody, EncryptedEnvelope};
use crate::debug::DebugConsole;
use crate::transport::ApiClient;

/// Arguments for the encrypt command
#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// JSON value to encrypt, e.g. '{"question":"why?"}'
    pub data: String,

    /// Print the full `{encrypted, payload}` body instead of the bare envelope
    #[arg(long)]
    pub body: bool,
}

/// Arguments for the decrypt command
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Envelope JSON (`{ciphertext, nonce, publicKey}`) or a full encrypted body
    pub envelope: String,
}

/// Resolve configuration (file, then environment, then flags) and build a
/// client over the file key store.
pub fn build_client(args: &ConnectionArgs) -> Result<ApiClient> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_toml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ClientConfig::from_env()?,
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(key_dir) = &args.key_dir {
        config.key_dir = key_dir.clone();
    }
    Ok(ApiClient::from_config(config)?)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn status(client: &ApiClient) -> Result<()> {
    let console = DebugConsole::new(client.session().clone());
    println!("🔍 Encryption status ({})", client.config().base_url);
    print_json(&console.status().await)
}

pub async fn handshake(client: &ApiClient) -> Result<()> {
    println!("🤝 Handshaking with {}...", client.config().base_url);
    if client.initialize().await {
        println!("✅ Encryption enabled");
    } else {
        println!("⚠️  Encryption not negotiated, requests will be sent in plaintext");
    }
    print_json(&client.status().await)
}

pub async fn encrypt(client: &ApiClient, args: EncryptArgs) -> Result<()> {
    let data: Value = serde_json::from_str(&args.data).context("data must be valid JSON")?;
    let console = DebugConsole::new(client.session().clone());
    let envelope = console.encrypt(&data).await?;
    if args.body {
        print_json(&EncryptedBody::new(envelope).to_value())
    } else {
        print_json(&envelope)
    }
}

pub async fn decrypt(client: &ApiClient, args: DecryptArgs) -> Result<()> {
    let raw: Value = serde_json::from_str(&args.envelope).context("envelope must be valid JSON")?;
    let envelope = match EncryptedBody::detect(&raw) {
        Some(body) => body?,
        None => serde_json::from_value::<EncryptedEnvelope>(raw)
            .map_err(|e| anyhow!("not an envelope or encrypted body: {}", e))?,
    };
    let console = DebugConsole::new(client.session().clone());
    print_json(&console.decrypt(&envelope).await?)
}

pub async fn keygen(client: &ApiClient) -> Result<()> {
    client.reset_encryption().await;
    let public_key = client.session().crypto().initialize().await?;
    println!("🔑 New key pair generated");
    println!("   Public key:  {}", crate::crypto::keys::encode(&public_key));
    println!("   Fingerprint: {}", crate::crypto::keys::fingerprint(&public_key));
    Ok(())
}

pub async fn reset(client: &ApiClient) -> Result<()> {
    client.logout().await;
    println!("🔄 Session key, tokens and handshake state cleared (key pair kept)");
    Ok(())
}
