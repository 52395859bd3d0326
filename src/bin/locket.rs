//! # Locket
//!
//! Seals a Kubernetes Secret into a Lockbox. Logs go to stderr so stdout
//! stays the encoded document.

use anyhow::Result;
use clap::Parser;
use lockbox_controller::cli::{self, Args};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lockbox_controller=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    cli::run(Args::parse()).await
}
