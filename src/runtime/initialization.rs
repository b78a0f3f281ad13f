//! # Initialization
//!
//! Controller startup: rustls crypto provider, tracing, metrics, the probe server,
//! the Kubernetes client, and the shared reconciler context.

use crate::config::{ControllerConfig, LogFormat};
use crate::controller::events::KubeEventPublisher;
use crate::controller::reconciler::Reconciler;
use crate::controller::registry::{KubeRegistry, Registry};
use crate::controller::server::{start_server, ServerState};
use crate::observability::{self, MetricsCollector, PrometheusMetrics};
use crate::provider::{BackendCache, VaultConnector};
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails when the crypto provider, metrics registry, or Kubernetes client cannot be set up.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    init_tracing(config.log_format);

    info!("Starting BMC secret controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let registry: Arc<dyn Registry> = Arc::new(KubeRegistry::new(client.clone()));
    let metrics: Arc<dyn MetricsCollector> = Arc::new(PrometheusMetrics);
    let cache = Arc::new(BackendCache::new(
        Arc::clone(&registry),
        Arc::new(VaultConnector),
        Some(Arc::clone(&metrics)),
    ));
    let events = Arc::new(KubeEventPublisher::new(client.clone()));

    info!(
        requeue_secs = config.requeue_interval_secs,
        error_requeue_secs = config.error_requeue_interval_secs,
        metrics_port = config.metrics_port,
        "Controller configured"
    );
    let reconciler = Arc::new(Reconciler::new(registry, cache, events, metrics, config));

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bmc_secret_controller=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
