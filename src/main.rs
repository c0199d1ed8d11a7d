#![warn(clippy::all, clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use linkrelay::{Config, app, cli::Cli};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS.
    // This prevents the error: "could not automatically determine the process-level CryptoProvider"
    // when both aws-lc-rs and ring features are available (or neither is explicitly selected).
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    // A missing .env is normal; real environment variables still apply.
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    app::dispatch::dispatch(cli, Arc::new(config)).await
}
