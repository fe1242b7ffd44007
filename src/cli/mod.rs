// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

/// E2E API client debug console
#[derive(Parser, Debug)]
#[command(name = "e2e-debug")]
#[command(version)]
#[command(about = "Inspect and exercise the API encryption layer", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the server and the key store live
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// TOML config file (otherwise configuration comes from the environment)
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// API base URL, e.g. http://127.0.0.1:5000/api
    #[arg(long, global = true, env = "E2E_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory holding the key store slots
    #[arg(long, global = true, env = "E2E_KEY_DIR")]
    pub key_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the encryption state (including stored keys) without contacting the server
    Status,

    /// Run the handshake and report whether encryption was negotiated
    Handshake,

    /// Encrypt a JSON value for the server as a request body would be
    Encrypt(commands::EncryptArgs),

    /// Decrypt an envelope addressed to this client
    Decrypt(commands::DecryptArgs),

    /// Destroy the stored key pair and generate a new one
    Keygen,

    /// Clear the session key and handshake state, keeping the key pair
    Reset,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let client = commands::build_client(&cli.connection)?;
    match cli.command {
        Commands::Status => commands::status(&client).await,
        Commands::Handshake => commands::handshake(&client).await,
        Commands::Encrypt(args) => commands::encrypt(&client, args).await,
        Commands::Decrypt(args) => commands::decrypt(&client, args).await,
        Commands::Keygen => commands::keygen(&client).await,
        Commands::Reset => commands::reset(&client).await,
    }
}
