//! # Events
//!
//! Kubernetes events emitted on BMCSecret and SecretBackendConfig resources.

use crate::constants::CONTROLLER_NAME;
use crate::crd::{BMCSecret, SecretBackendConfig};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::{Client, Resource};
use kube_runtime::events::{Event, EventType, Recorder, Reporter};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReason {
    Synced,
    PartialSync,
    SyncFailed,
    MissingCredentials,
    BackendUnavailable,
    NoBMCReference,
    BMCDiscoveryFailed,
    NoMatchingEngines,
    CleanupFailed,
    ConfigReloaded,
}

impl EventReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "Synced",
            Self::PartialSync => "PartialSync",
            Self::SyncFailed => "SyncFailed",
            Self::MissingCredentials => "MissingCredentials",
            Self::BackendUnavailable => "BackendUnavailable",
            Self::NoBMCReference => "NoBMCReference",
            Self::BMCDiscoveryFailed => "BMCDiscoveryFailed",
            Self::NoMatchingEngines => "NoMatchingEngines",
            Self::CleanupFailed => "CleanupFailed",
            Self::ConfigReloaded => "ConfigReloaded",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Self::CleanupFailed => "Cleanup",
            Self::ConfigReloaded => "Reload",
            _ => "Sync",
        }
    }
}

impl fmt::Display for EventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub severity: Severity,
    pub reason: EventReason,
    pub message: String,
}

impl SyncEvent {
    pub fn normal(reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Normal,
            reason,
            message: message.into(),
        }
    }

    pub fn warning(reason: EventReason, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            reason,
            message: message.into(),
        }
    }
}

/// Outlet for user-visible sync notifications
///
/// Publishing is fire-and-forget: implementations log failures instead of returning them.
#[async_trait]
pub trait EventPublisher: Send + Sync + fmt::Debug {
    async fn publish(&self, secret: &BMCSecret, event: SyncEvent);

    async fn publish_config(&self, config: &SecretBackendConfig, event: SyncEvent);
}

/// [`EventPublisher`] backed by the events API
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }

    async fn send(&self, reference: &ObjectReference, event: SyncEvent) {
        let ev = Event {
            type_: match event.severity {
                Severity::Normal => EventType::Normal,
                Severity::Warning => EventType::Warning,
            },
            reason: event.reason.as_str().to_string(),
            note: Some(event.message),
            action: event.reason.action().to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&ev, reference).await {
            warn!(reason = %event.reason, error = %e, "Failed to publish event");
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(&self, secret: &BMCSecret, event: SyncEvent) {
        self.send(&secret.object_ref(&()), event).await;
    }

    async fn publish_config(&self, config: &SecretBackendConfig, event: SyncEvent) {
        self.send(&config.object_ref(&()), event).await;
    }
}
