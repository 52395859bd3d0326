//! # Runtime
//!
//! Controller runtime: startup, the reconcile watch loop and its error policy.
//!
//! - `initialization.rs` - rustls, tracing, metrics, key pair, servers, client
//! - `watch_loop.rs` - kube-runtime `Controller` and the Lockbox lifecycle watch
//! - `error_policy.rs` - per-Lockbox Fibonacci backoff after failures

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use anyhow::Result;

use crate::config::{ControllerConfig, LogFormat};

/// Run the controller until it receives a shutdown signal
///
/// Tracing is installed before the rest of the configuration is read so that
/// rejected values are reported.
pub async fn run() -> Result<()> {
    initialization::init_tracing(LogFormat::from_env());
    let config = ControllerConfig::from_env();
    let init = initialization::initialize(&config).await?;

    tokio::spawn(watch_loop::run_lockbox_watch(
        init.client.clone(),
        init.state_metrics,
        std::sync::Arc::clone(&init.context),
    ));
    watch_loop::run_watch_loop(init.client, init.context, init.server_state).await;
    Ok(())
}
