//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::events::EventPublisher;
use crate::controller::reconciler::resolver::CredentialError;
use crate::controller::reconciler::status::SyncStatusTracker;
use crate::controller::registry::{Registry, RegistryError};
use crate::observability::MetricsCollector;
use crate::provider::{BackendCache, BackendError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to discover BMCs: {0}")]
    Discovery(#[source] RegistryError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl ReconcilerError {
    /// Errors retrying sooner cannot fix
    pub fn requires_operator(&self) -> bool {
        matches!(self, Self::Backend(e) if e.requires_operator())
    }
}

/// Shared context of every reconciliation
pub struct Reconciler {
    pub registry: Arc<dyn Registry>,
    pub cache: Arc<BackendCache>,
    pub events: Arc<dyn EventPublisher>,
    pub metrics: Arc<dyn MetricsCollector>,
    pub config: ControllerConfig,
    pub(crate) status: SyncStatusTracker,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        registry: Arc<dyn Registry>,
        cache: Arc<BackendCache>,
        events: Arc<dyn EventPublisher>,
        metrics: Arc<dyn MetricsCollector>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            status: SyncStatusTracker::new(Arc::clone(&registry)),
            registry,
            cache,
            events,
            metrics,
            config,
        }
    }
}
