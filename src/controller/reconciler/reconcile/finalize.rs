//! # Finalize
//!
//! Deletion of a BMCSecret: remove its secrets from every destination, drop its sync
//! status, and release the finalizer.
//!
//! The finalizer is released even when the backend cannot be reached. Remote secrets
//! may be orphaned then; the BMCSecret is never blocked from deletion.

use crate::constants::BACKEND_CLEANUP_FINALIZER;
use crate::controller::events::{EventReason, SyncEvent};
use crate::controller::reconciler::resolver::{extract_credentials, BmcTarget};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::BMCSecret;
use crate::paths::PathVariables;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tracing::{info, warn};

/// Outcome of the remote cleanup
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Cleanup {
    deleted: usize,
    failed: usize,
}

impl Reconciler {
    pub(super) async fn finalize(&self, secret: &BMCSecret) -> Result<Action, ReconcilerError> {
        if !secret.has_finalizer(BACKEND_CLEANUP_FINALIZER) {
            return Ok(Action::await_change());
        }
        let name = secret.name_any();
        info!("Cleaning up backend secrets");

        match self.delete_remote(secret).await {
            Ok(cleanup) => info!(
                deleted = cleanup.deleted,
                failed = cleanup.failed,
                "Backend cleanup finished"
            ),
            Err(message) => {
                warn!(error = %message, "Backend cleanup skipped, allowing deletion to proceed");
                self.events
                    .publish(
                        secret,
                        SyncEvent::warning(EventReason::CleanupFailed, message),
                    )
                    .await;
            }
        }

        if let Err(e) = self.status.delete(&name).await {
            warn!(error = %e, "Failed to delete sync status");
        }

        self.registry
            .remove_finalizer(secret, BACKEND_CLEANUP_FINALIZER)
            .await?;
        info!("Removed finalizer");
        Ok(Action::await_change())
    }

    /// Delete the secret at every path it could have been written to
    ///
    /// Paths are recomputed from the current configuration. Individual delete
    /// failures are counted and skipped; an `Err` means no deletion was attempted.
    async fn delete_remote(&self, secret: &BMCSecret) -> Result<Cleanup, String> {
        let state = self
            .cache
            .snapshot()
            .await
            .map_err(|e| format!("Backend unavailable during cleanup: {e}"))?;
        let credentials = extract_credentials(secret)
            .map_err(|e| format!("Cannot compute paths during cleanup: {e}"))?;
        let bmcs = self
            .discover_bmcs(&secret.name_any())
            .await
            .map_err(|e| format!("BMC discovery failed during cleanup: {e}"))?;

        let mut cleanup = Cleanup::default();
        for route in state.cleanup_routes(secret.labels()) {
            for bmc in &bmcs {
                let target = BmcTarget::from_bmc(bmc, state.region_label_key());
                let variables =
                    PathVariables::new(target.region, target.hostname, credentials.username());
                let path = match route.template.render(&variables) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(bmc = %target.name, error = %e, "Failed to build path during cleanup");
                        cleanup.failed += 1;
                        continue;
                    }
                };
                match route.store.delete(&path).await {
                    Ok(()) => {
                        info!(path = %path, engine = route.engine.unwrap_or_default(), "Deleted secret from backend");
                        cleanup.deleted += 1;
                    }
                    Err(e) => {
                        warn!(path = %path, error = %route.qualify(&e.to_string()), "Failed to delete secret from backend");
                        cleanup.failed += 1;
                    }
                }
            }
        }
        Ok(cleanup)
    }
}
