//! # Sync Status
//!
//! Persists the outcome of every (destination, BMC) pair to the BMCSecret's
//! `BMCSecretSyncStatus` resource.

use crate::constants::CONDITION_SYNCED;
use crate::controller::registry::{Registry, RegistryError};
use crate::crd::{
    sync_status_name, BMCSecretSyncStatus, BMCSecretSyncStatusSpec, BMCSecretSyncStatusStatus,
    BackendPathStatus, Condition, SyncOutcome,
};
use std::sync::Arc;
use tracing::debug;

/// Per-pair results of one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub entries: Vec<BackendPathStatus>,
    pub successful: u32,
    pub failed: u32,
}

impl SyncSummary {
    pub fn push(&mut self, entry: BackendPathStatus) {
        match entry.sync_status {
            SyncOutcome::Success => self.successful += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
        self.entries.push(entry);
    }

    pub fn total(&self) -> u32 {
        self.successful + self.failed
    }
}

/// The `Synced` condition for a set of results
///
/// - no failure: `True` / `AllPathsSynced`
/// - some failures: `False` / `PartialSync`
/// - only failures: `False` / `SyncFailed`
pub fn synced_condition(summary: &SyncSummary, now: &str, generation: Option<i64>) -> Condition {
    let (status, reason, message) = match (summary.successful, summary.failed) {
        (successful, 0) => (
            "True",
            "AllPathsSynced",
            format!("Successfully synced to {successful} backend paths"),
        ),
        (0, failed) => ("False", "SyncFailed", format!("Failed to sync to {failed} paths")),
        (successful, failed) => (
            "False",
            "PartialSync",
            format!(
                "Synced {successful}/{} paths, {failed} failed",
                summary.total()
            ),
        ),
    };
    Condition {
        r#type: CONDITION_SYNCED.to_string(),
        status: status.to_string(),
        last_transition_time: Some(now.to_string()),
        reason: Some(reason.to_string()),
        message: Some(message),
        observed_generation: generation,
    }
}

#[derive(Debug, Clone)]
pub struct SyncStatusTracker {
    registry: Arc<dyn Registry>,
}

impl SyncStatusTracker {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    /// Create the status resource if needed, then replace its status
    ///
    /// # Errors
    ///
    /// Returns the registry error of the failed read, create, or update.
    pub async fn upsert(
        &self,
        secret_name: &str,
        summary: &SyncSummary,
        now: &str,
    ) -> Result<(), RegistryError> {
        let name = sync_status_name(secret_name);
        let mut record = match self.registry.get_sync_status(&name).await? {
            Some(record) => record,
            None => {
                debug!(status = %name, "Creating sync status");
                let record = BMCSecretSyncStatus::new(
                    &name,
                    BMCSecretSyncStatusSpec {
                        bmc_secret_ref: secret_name.to_string(),
                    },
                );
                self.registry.create_sync_status(&record).await?
            }
        };

        let generation = record.metadata.generation;
        let status = record.status.get_or_insert_with(BMCSecretSyncStatusStatus::default);
        status.backend_paths.clone_from(&summary.entries);
        status.last_sync_attempt = Some(now.to_string());
        status.total_paths = summary.total();
        status.successful_paths = summary.successful;
        status.failed_paths = summary.failed;
        Condition::apply(
            &mut status.conditions,
            synced_condition(summary, now, generation),
        );

        self.registry.update_sync_status(&record).await
    }

    /// # Errors
    ///
    /// Returns the registry error; a missing resource is not an error.
    pub async fn delete(&self, secret_name: &str) -> Result<(), RegistryError> {
        self.registry
            .delete_sync_status(&sync_status_name(secret_name))
            .await
    }
}
