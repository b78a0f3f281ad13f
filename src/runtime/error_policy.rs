//! # Error Policy
//!
//! Requeue decisions for failed reconciliations and classification of watch
//! stream errors.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::BMCSecret;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Delay before retrying after `error`
///
/// Errors that need an operator to change the configuration wait the normal
/// interval; everything else retries at the shorter error interval.
pub fn requeue_delay(error: &ReconcilerError, config: &ControllerConfig) -> Duration {
    if error.requires_operator() {
        config.requeue_interval()
    } else {
        config.error_requeue_interval()
    }
}

/// Error policy passed to the kube-runtime controller
pub fn handle_reconciliation_error(
    obj: Arc<BMCSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        bmcsecret = %name,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation failed");
    let delay = requeue_delay(error, &ctx.config);
    info!(retry_in_secs = delay.as_secs(), "Requeueing BMCSecret");
    Action::requeue(delay)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    NotFound,
    Unauthorized,
    Expired,
    Throttled,
    Other,
}

/// Classify a watch stream error by its rendered message
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a decode error mentioning other codes
    if error.contains("404") || error.contains("NotFound") || error.contains("not found") {
        WatchErrorKind::NotFound
    } else if error.contains("401") || error.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
    {
        WatchErrorKind::Expired
    } else if error.contains("429") || error.contains("TooManyRequests") {
        WatchErrorKind::Throttled
    } else {
        WatchErrorKind::Other
    }
}

/// Log a watch stream error; the watcher's own backoff handles the restart
pub fn handle_watch_stream_error(error: &str) {
    let error_span = tracing::span!(tracing::Level::WARN, "controller.watch.error", error = %error);
    let _error_guard = error_span.enter();

    match classify_watch_error(error) {
        WatchErrorKind::NotFound => {
            error!("Watched resource type not found, check that the CRDs are installed");
        }
        WatchErrorKind::Unauthorized => {
            error!("Watch unauthorized, check the controller's RBAC and service account token");
        }
        WatchErrorKind::Expired => info!("Watch resource version expired, relisting"),
        WatchErrorKind::Throttled => warn!("API server throttled the watch, backing off"),
        WatchErrorKind::Other => warn!("Watch stream error"),
    }
}
