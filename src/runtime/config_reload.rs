//! # Config Reload
//!
//! Reacts to changes of the `default-backend-config` SecretBackendConfig.
//!
//! A change drops the cached backend so the next reconciliation rebuilds stores and
//! routes from the new settings. The resource then gets a `Ready` condition with
//! the reload time and the generation it was observed at.

use crate::constants::{CONDITION_READY, DEFAULT_BACKEND_CONFIG_NAME};
use crate::controller::events::{EventReason, SyncEvent};
use crate::controller::reconciler::Reconciler;
use crate::controller::registry::RegistryError;
use crate::crd::{Condition, SecretBackendConfig};
use chrono::{SecondsFormat, Utc};
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// What a config change did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The cache was dropped
    Reloaded,
    /// The generation was already observed; only status changed
    Unchanged,
    /// Not the singleton the controller reads
    Ignored,
}

/// Handle an applied (created or updated) SecretBackendConfig
///
/// # Errors
///
/// Returns the registry error when the status could not be written. The cache is
/// already invalidated at that point.
pub async fn handle_config_applied(
    reconciler: &Reconciler,
    config: &SecretBackendConfig,
) -> Result<ReloadOutcome, RegistryError> {
    if config.name_any() != DEFAULT_BACKEND_CONFIG_NAME {
        debug!(name = %config.name_any(), "Ignoring SecretBackendConfig");
        return Ok(ReloadOutcome::Ignored);
    }

    let generation = config.metadata.generation;
    let observed = config
        .status
        .as_ref()
        .and_then(|status| status.observed_generation);
    if generation.is_some() && generation == observed {
        return Ok(ReloadOutcome::Unchanged);
    }

    invalidate(reconciler).await;
    info!(generation = ?generation, "Secret backend configuration reloaded");
    reconciler
        .events
        .publish_config(
            config,
            SyncEvent::normal(
                EventReason::ConfigReloaded,
                "Backend configuration changed, cached backend discarded",
            ),
        )
        .await;

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut updated = config.clone();
    let status = updated.status.get_or_insert_with(Default::default);
    Condition::apply(
        &mut status.conditions,
        Condition {
            r#type: CONDITION_READY.to_string(),
            status: "True".to_string(),
            last_transition_time: Some(now.clone()),
            reason: Some(EventReason::ConfigReloaded.as_str().to_string()),
            message: Some("Configuration loaded".to_string()),
            observed_generation: generation,
        },
    );
    status.last_reload_time = Some(now);
    status.observed_generation = generation;
    reconciler
        .registry
        .update_backend_config_status(&updated)
        .await?;
    Ok(ReloadOutcome::Reloaded)
}

/// Handle a deleted SecretBackendConfig; the controller falls back to environment settings
pub async fn handle_config_deleted(
    reconciler: &Reconciler,
    config: &SecretBackendConfig,
) -> ReloadOutcome {
    if config.name_any() != DEFAULT_BACKEND_CONFIG_NAME {
        return ReloadOutcome::Ignored;
    }
    invalidate(reconciler).await;
    info!("SecretBackendConfig deleted, falling back to environment configuration");
    ReloadOutcome::Reloaded
}

async fn invalidate(reconciler: &Reconciler) {
    if let Err(e) = reconciler.cache.invalidate().await {
        warn!(error = %e, "Error closing previous secret backend");
    }
}
