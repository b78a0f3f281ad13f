//! # Reconciliation Logic
//!
//! One pass over a BMCSecret:
//!
//! 1. Fetch the BMCSecret; a missing one needs no work
//! 2. Being deleted: clean up the backend and release the finalizer
//! 3. Skip secrets without the global sync label
//! 4. Add the finalizer before anything is written
//! 5. Discover the BMCs referencing the secret and extract the credentials
//! 6. Sync every (destination, BMC) pair and record the outcome

mod finalize;
mod sync;

pub use sync::{sync_routes, FailedWrite, SyncResult};

use crate::constants::BACKEND_CLEANUP_FINALIZER;
use crate::controller::events::{EventReason, SyncEvent};
use crate::controller::reconciler::resolver::{
    bmcs_for_secret, extract_credentials, BmcTarget,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::{BMCSecret, BMC};
use chrono::{SecondsFormat, Utc};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

const RESULT_SUCCESS: &str = "success";
const RESULT_ERROR: &str = "error";

/// Entry point for the controller runtime
///
/// # Errors
///
/// See [`Reconciler::reconcile_secret`].
pub async fn reconcile(
    secret: Arc<BMCSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    ctx.reconcile_secret(&secret.name_any()).await
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Reconciler {
    /// Run one reconciliation pass for the BMCSecret called `name`
    ///
    /// # Errors
    ///
    /// Registry, backend, discovery, and credential errors end the pass early and
    /// are returned so the error policy can requeue. Per-path failures are not errors.
    pub async fn reconcile_secret(&self, name: &str) -> Result<Action, ReconcilerError> {
        let span = info_span!("reconcile", bmcsecret = name);
        async move {
            let started = Instant::now();
            let (operation, result) = match self.registry.get_bmc_secret(name).await {
                Ok(Some(secret)) if secret.is_being_deleted() => {
                    ("deletion", self.finalize(&secret).await)
                }
                Ok(Some(secret)) => ("reconcile", self.sync_secret(&secret).await),
                Ok(None) => {
                    debug!("BMCSecret no longer exists");
                    ("reconcile", Ok(Action::await_change()))
                }
                Err(e) => ("reconcile", Err(e.into())),
            };

            let outcome = if result.is_ok() {
                RESULT_SUCCESS
            } else {
                RESULT_ERROR
            };
            self.metrics
                .record_reconcile(operation, started.elapsed(), outcome);
            result
        }
        .instrument(span)
        .await
    }

    async fn sync_secret(&self, secret: &BMCSecret) -> Result<Action, ReconcilerError> {
        let name = secret.name_any();
        let requeue = Action::requeue(self.config.requeue_interval());

        let state = match self.cache.snapshot().await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Secret backend unavailable");
                self.events
                    .publish(
                        secret,
                        SyncEvent::warning(EventReason::BackendUnavailable, e.to_string()),
                    )
                    .await;
                return Err(e.into());
            }
        };

        let labels = secret.labels();
        if let Some(sync_label) = state.global_sync_label() {
            if !sync_label.matches(labels) {
                debug!(sync_label = %sync_label, "BMCSecret does not have the sync label, skipping");
                return Ok(requeue);
            }
        }

        if !secret.has_finalizer(BACKEND_CLEANUP_FINALIZER) {
            self.registry
                .add_finalizer(secret, BACKEND_CLEANUP_FINALIZER)
                .await?;
            debug!("Added finalizer");
        }

        let bmcs = match self.discover_bmcs(&name).await {
            Ok(bmcs) => bmcs,
            Err(e) => {
                warn!(error = %e, "Failed to find BMCs for secret");
                self.events
                    .publish(
                        secret,
                        SyncEvent::warning(EventReason::BMCDiscoveryFailed, e.to_string()),
                    )
                    .await;
                return Err(e);
            }
        };
        if bmcs.is_empty() {
            info!("No BMCs reference this secret");
            self.events
                .publish(
                    secret,
                    SyncEvent::normal(
                        EventReason::NoBMCReference,
                        "No BMCs reference this secret",
                    ),
                )
                .await;
            return Ok(requeue);
        }

        let extracted = extract_credentials(secret);
        let extraction_error = extracted.as_ref().err().map(ToString::to_string);
        self.metrics
            .record_credential_extraction(&name, extraction_error.as_deref());
        let credentials = match extracted {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "Failed to extract credentials");
                self.events
                    .publish(
                        secret,
                        SyncEvent::warning(EventReason::MissingCredentials, e.to_string()),
                    )
                    .await;
                return Err(e.into());
            }
        };

        let routes = state.routes(labels);
        if routes.is_empty() {
            info!("No secret engines match the BMCSecret labels");
            self.events
                .publish(
                    secret,
                    SyncEvent::normal(
                        EventReason::NoMatchingEngines,
                        "No secret engines match this BMCSecret's labels",
                    ),
                )
                .await;
            return Ok(requeue);
        }

        let targets: Vec<BmcTarget> = bmcs
            .iter()
            .map(|bmc| BmcTarget::from_bmc(bmc, state.region_label_key()))
            .collect();
        let now = timestamp();
        let SyncResult {
            summary,
            failed_writes,
        } = sync_routes(&routes, &targets, &credentials, &now).await;

        for failure in &failed_writes {
            let message = match &failure.engine {
                Some(engine) => format!(
                    "Failed to sync to {} (engine {engine}): {}",
                    failure.path, failure.error
                ),
                None => format!("Failed to sync to {}: {}", failure.path, failure.error),
            };
            self.events
                .publish(secret, SyncEvent::warning(EventReason::SyncFailed, message))
                .await;
        }

        if let Err(e) = self.status.upsert(&name, &summary, &now).await {
            warn!(error = %e, "Failed to update sync status");
        }
        self.metrics
            .record_sync_status(&name, summary.successful, summary.failed);

        let engines = routes.iter().filter(|route| route.engine.is_some()).count();
        let across = if engines > 0 {
            format!(" across {engines} engines")
        } else {
            String::new()
        };
        let event = match (summary.successful, summary.failed) {
            (successful, 0) => SyncEvent::normal(
                EventReason::Synced,
                format!("Successfully synced to {successful} backend paths{across}"),
            ),
            (0, failed) => SyncEvent::warning(
                EventReason::SyncFailed,
                format!("Failed to sync to {failed} backend paths{across}"),
            ),
            (successful, _) => SyncEvent::warning(
                EventReason::PartialSync,
                format!("Synced {successful}/{} secrets{across}", summary.total()),
            ),
        };
        self.events.publish(secret, event).await;

        info!(
            successful = summary.successful,
            failed = summary.failed,
            bmcs = targets.len(),
            destinations = routes.len(),
            "Reconciliation complete"
        );
        Ok(requeue)
    }

    /// BMCs referencing `secret_name`, with discovery metrics recorded
    async fn discover_bmcs(&self, secret_name: &str) -> Result<Vec<BMC>, ReconcilerError> {
        let started = Instant::now();
        let bmcs = self
            .registry
            .list_bmcs()
            .await
            .map_err(ReconcilerError::Discovery)?;
        let bmcs = bmcs_for_secret(bmcs, secret_name);
        self.metrics
            .record_bmc_discovery(secret_name, started.elapsed());
        self.metrics.record_bmc_count(secret_name, bmcs.len());
        Ok(bmcs)
    }
}
