//! # Sync
//!
//! Writes the credentials to every (destination, BMC) pair. A failure on one pair is
//! recorded and the batch moves on.

use crate::controller::reconciler::resolver::{BmcTarget, Credentials};
use crate::controller::reconciler::status::SyncSummary;
use crate::crd::{BackendPathStatus, SyncOutcome};
use crate::paths::PathVariables;
use crate::provider::{Route, SecretData, SecretStore, StoreError};
use serde_json::Value;
use tracing::{debug, info, warn};

/// A write the backend rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub path: String,
    pub engine: Option<String>,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct SyncResult {
    pub summary: SyncSummary,
    pub failed_writes: Vec<FailedWrite>,
}

/// Sync every route × target pair, in route order
pub async fn sync_routes(
    routes: &[Route<'_>],
    targets: &[BmcTarget],
    credentials: &Credentials,
    now: &str,
) -> SyncResult {
    let mut result = SyncResult::default();
    let mut data = SecretData::new();
    data.insert(
        "username".to_string(),
        Value::String(credentials.username().to_string()),
    );
    data.insert(
        "password".to_string(),
        Value::String(credentials.password().to_string()),
    );

    for route in routes {
        let engine = route.engine.unwrap_or_default();
        for target in targets {
            let record = |path: &str, error: Option<String>| BackendPathStatus {
                path: path.to_string(),
                bmc_name: target.name.clone(),
                region: target.region.clone(),
                hostname: target.hostname.clone(),
                username: credentials.username().to_string(),
                last_sync_time: now.to_string(),
                sync_status: if error.is_some() {
                    SyncOutcome::Failed
                } else {
                    SyncOutcome::Success
                },
                error_message: error,
            };

            let variables =
                PathVariables::new(&target.region, &target.hostname, credentials.username());
            let path = match route.template.render(&variables) {
                Ok(path) => path,
                Err(e) => {
                    warn!(bmc = %target.name, engine, error = %e, "Failed to build path");
                    result
                        .summary
                        .push(record("", Some(route.qualify(&e.to_string()))));
                    continue;
                }
            };

            match needs_update(route.store, &path, credentials.password()).await {
                Err(e) => {
                    warn!(path = %path, engine, error = %e, "Failed to check if update needed");
                    result
                        .summary
                        .push(record(&path, Some(route.qualify(&e.to_string()))));
                }
                Ok(false) => {
                    debug!(path = %path, engine, "Secret already up to date");
                    result.summary.push(record(&path, None));
                }
                Ok(true) => match route.store.write(&path, &data).await {
                    Ok(()) => {
                        info!(path = %path, engine, "Synced secret");
                        result.summary.push(record(&path, None));
                    }
                    Err(e) => {
                        warn!(path = %path, engine, error = %e, "Failed to write secret to backend");
                        result
                            .summary
                            .push(record(&path, Some(route.qualify(&e.to_string()))));
                        result.failed_writes.push(FailedWrite {
                            path,
                            engine: route.engine.map(str::to_string),
                            error: e.to_string(),
                        });
                    }
                },
            }
        }
    }

    result
}

/// `true` when nothing is stored at `path` or the stored password differs
async fn needs_update(
    store: &dyn SecretStore,
    path: &str,
    password: &str,
) -> Result<bool, StoreError> {
    if !store.exists(path).await? {
        return Ok(true);
    }
    let current = store.read(path).await?;
    Ok(current.get("password").and_then(Value::as_str) != Some(password))
}
