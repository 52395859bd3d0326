//! # Initialization
//!
//! Controller startup: rustls, tracing, metrics, key pair, HTTP servers and
//! the Kubernetes client.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use kube::Client;
use tracing::{error, info};

use crate::config::{ControllerConfig, LogFormat};
use crate::controller::events::KubeEventSink;
use crate::controller::reconciler::{Context, Reconciler};
use crate::controller::store::KubeSecretStore;
use crate::crypto::KeyPair;
use crate::observability::{metrics, state_metrics::StateMetrics};
use crate::server::{self, ServerState};

/// Everything the watch loops need once startup has finished
pub struct InitializationResult {
    pub client: Client,
    pub context: Arc<Context>,
    pub server_state: Arc<ServerState>,
    pub state_metrics: Arc<StateMetrics>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Install the global tracing subscriber; must run before configuration is loaded
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lockbox_controller=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Metrics registration
/// - Key-pair loading
/// - Metrics/probe and public key server startup
/// - Kubernetes client creation
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    // Required for rustls 0.23+ before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    info!("Starting Lockbox controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    metrics::register_metrics()?;
    let state_metrics = Arc::new(StateMetrics::new()?);
    state_metrics.register(&metrics::REGISTRY)?;

    let keypair = KeyPair::from_file(&config.keypair_path).with_context(|| {
        format!("Failed to load key pair from {}", config.keypair_path.display())
    })?;
    info!(public_key = %keypair.public, "Loaded key pair");

    let server_state = Arc::new(ServerState::default());
    spawn_server(
        "metrics",
        config.metrics_addr,
        server::metrics_router(Arc::clone(&server_state)),
    );
    spawn_server(
        "public-key",
        config.http_addr,
        server::public_key_router(keypair.public.clone()),
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let reconciler = Reconciler::new(
        Arc::new(keypair),
        Arc::new(KubeSecretStore::new(client.clone())),
        Arc::new(KubeEventSink::new(client.clone())),
    );
    let context = Arc::new(
        Context::new(reconciler, config.sync_period())
            .with_backoff(config.backoff_min_minutes, config.backoff_max_minutes),
    );

    Ok(InitializationResult {
        client,
        context,
        server_state,
        state_metrics,
    })
}

fn spawn_server(name: &'static str, addr: std::net::SocketAddr, router: axum::Router) {
    tokio::spawn(async move {
        if let Err(e) = server::serve(name, addr, router).await {
            error!(server = name, "HTTP server error: {}", e);
        }
    });
}
