//! # Watch Loop
//!
//! Runs the BMCSecret controller alongside the SecretBackendConfig watch.
//!
//! The controller's scheduler is the work queue: one reconciliation per BMCSecret at
//! a time, at most `max_concurrent_reconciles` in total. A BMC change requeues the
//! BMCSecret it references.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{BMCSecret, SecretBackendConfig, BMC};
use crate::runtime::config_reload::{handle_config_applied, handle_config_deleted};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube::Client;
use kube_runtime::reflector::ObjectRef;
use kube_runtime::watcher::{self, Event};
use kube_runtime::{controller, Controller, WatchStreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run until a shutdown signal is received
///
/// # Errors
///
/// Only fails when closing the secret backend on shutdown fails.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let secrets: Api<BMCSecret> = Api::all(client.clone());
    let bmcs: Api<BMC> = Api::all(client.clone());
    let configs: Api<SecretBackendConfig> = Api::all(client);

    let controller_config =
        controller::Config::default().concurrency(reconciler.config.max_concurrent_reconciles);

    info!(
        concurrency = reconciler.config.max_concurrent_reconciles,
        "Starting controller watch loop"
    );
    server_state.set_ready(true);

    let controller_future = Controller::new(secrets, watcher::Config::default().any_semantic())
        .with_config(controller_config)
        .watches(bmcs, watcher::Config::default(), |bmc: BMC| {
            bmc.secret_name().map(ObjectRef::<BMCSecret>::new)
        })
        .shutdown_on_signal()
        .run(
            reconcile,
            handle_reconciliation_error,
            Arc::clone(&reconciler),
        )
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => debug!(bmcsecret = %obj.name, "Reconciled"),
                Err(e) => handle_watch_stream_error(&e.to_string()),
            }
        });

    tokio::select! {
        () = controller_future => info!("Controller stopped"),
        () = watch_backend_config(configs, Arc::clone(&reconciler)) => {
            warn!("SecretBackendConfig watch ended");
        }
    }

    server_state.set_ready(false);
    info!("Closing secret backend");
    reconciler.cache.close().await?;
    Ok(())
}

/// Invalidate the backend cache whenever the SecretBackendConfig changes
async fn watch_backend_config(configs: Api<SecretBackendConfig>, reconciler: Arc<Reconciler>) {
    let mut stream = watcher::watcher(configs, watcher::Config::default())
        .default_backoff()
        .boxed();
    let mut initialized = false;

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Apply(config)) => {
                if let Err(e) = handle_config_applied(&reconciler, &config).await {
                    warn!(error = %e, "Failed to update SecretBackendConfig status");
                }
            }
            Ok(Event::Delete(config)) => {
                handle_config_deleted(&reconciler, &config).await;
            }
            Ok(Event::InitDone) => {
                // A relist after a watch restart may hide changes made while disconnected
                if initialized {
                    if let Err(e) = reconciler.cache.invalidate().await {
                        warn!(error = %e, "Error closing previous secret backend");
                    }
                }
                initialized = true;
            }
            Ok(Event::Init | Event::InitApply(_)) => {}
            Err(e) => handle_watch_stream_error(&e.to_string()),
        }
    }
}
