//! # Lockbox Controller
//!
//! Watches `Lockbox` resources in every namespace and keeps the Secret each
//! one describes in sync. Configuration is read from the environment, see
//! [`lockbox_controller::config`].

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    lockbox_controller::runtime::run().await
}
