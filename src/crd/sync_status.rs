//! # BMCSecretSyncStatus
//!
//! One resource per BMCSecret, named `<bmcsecret>-sync-status`, listing every
//! backend path the secret was synced to and the outcome of the last attempt.

use crate::constants::SYNC_STATUS_SUFFIX;
use crate::crd::Condition;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "BMCSecretSyncStatus",
    group = "config.metal.ironcore.dev",
    version = "v1alpha1",
    status = "BMCSecretSyncStatusStatus",
    printcolumn = r#"{"name":"BMCSecret", "type":"string", "jsonPath":".spec.bmcSecretRef"}, {"name":"Total", "type":"integer", "jsonPath":".status.totalPaths"}, {"name":"Successful", "type":"integer", "jsonPath":".status.successfulPaths"}, {"name":"Failed", "type":"integer", "jsonPath":".status.failedPaths"}, {"name":"Last Sync", "type":"date", "jsonPath":".status.lastSyncAttempt"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BMCSecretSyncStatusSpec {
    /// Name of the tracked BMCSecret
    pub bmc_secret_ref: String,
}

/// Outcome of the last sync attempt for one backend path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum SyncOutcome {
    #[default]
    Success,
    Failed,
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Failed => f.write_str("Failed"),
        }
    }
}

/// One (destination, BMC) pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendPathStatus {
    /// Logical path in the backend, empty when the path template failed to render
    pub path: String,
    pub bmc_name: String,
    pub region: String,
    pub hostname: String,
    pub username: String,
    /// RFC 3339 timestamp of the attempt
    pub last_sync_time: String,
    pub sync_status: SyncOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BMCSecretSyncStatusStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backend_paths: Vec<BackendPathStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_attempt: Option<String>,
    #[serde(default)]
    pub total_paths: u32,
    #[serde(default)]
    pub successful_paths: u32,
    #[serde(default)]
    pub failed_paths: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Name of the sync status resource tracking `bmc_secret`
pub fn sync_status_name(bmc_secret: &str) -> String {
    format!("{bmc_secret}{SYNC_STATUS_SUFFIX}")
}
