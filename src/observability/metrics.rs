//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `bmcsecret_reconcile_duration_seconds` - Duration of reconciliations by operation
//! - `bmcsecret_reconcile_total` - Reconciliations by result
//! - `bmcsecret_bmc_count` - BMCs referencing a BMCSecret
//! - `bmcsecret_sync_success_paths` / `bmcsecret_sync_failed_paths` - Path outcomes of the last pass
//! - `bmcsecret_sync_last_success_timestamp` - Unix time of the last fully successful pass
//! - `bmcsecret_backend_operation_duration_seconds` - Backend call latency
//! - `bmcsecret_backend_operation_total` - Backend calls by result
//! - `bmcsecret_backend_errors_total` - Backend errors by classified type
//! - `bmcsecret_backend_auth_duration_seconds` / `bmcsecret_backend_auth_total` - Backend logins
//! - `bmcsecret_bmc_discovery_duration_seconds` - Time spent listing BMCs
//! - `bmcsecret_credential_extraction_total` - Credential extraction by result

use anyhow::Result;
use prometheus::{GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RESULT_SUCCESS: &str = "success";
const RESULT_ERROR: &str = "error";

/// Recording interface consumed by the sync engine
///
/// Every method defaults to a no-op so test doubles only implement what they observe.
/// `error` carries the error text of a failed call and is `None` on success.
pub trait MetricsCollector: Send + Sync + fmt::Debug {
    fn record_auth(&self, _method: &str, _backend_type: &str, _duration: Duration, _error: Option<&str>) {}

    /// `engine` is empty for the default destination
    fn record_backend_operation(
        &self,
        _operation: &str,
        _backend_type: &str,
        _engine: &str,
        _duration: Duration,
        _error: Option<&str>,
    ) {
    }

    fn record_reconcile(&self, _operation: &str, _duration: Duration, _result: &str) {}

    fn record_bmc_count(&self, _secret: &str, _count: usize) {}

    fn record_sync_status(&self, _secret: &str, _successful: u32, _failed: u32) {}

    fn record_credential_extraction(&self, _secret: &str, _error: Option<&str>) {}

    fn record_bmc_discovery(&self, _secret: &str, _duration: Duration) {}
}

/// Coarse error category used as the `error_type` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Network,
    Auth,
    NotFound,
    Timeout,
    Config,
    Unknown,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::Config => "config",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error by the text it renders to
///
/// Categories are checked in order, first match wins.
pub fn classify_error(message: &str) -> ErrorType {
    const RULES: &[(ErrorType, &[&str])] = &[
        (
            ErrorType::Network,
            &["connection refused", "connection reset", "dial tcp", "no such host"],
        ),
        (
            ErrorType::Auth,
            &[
                "authentication failed",
                "unauthorized",
                "permission denied",
                "forbidden",
                "invalid token",
            ],
        ),
        (ErrorType::NotFound, &["not found", "does not exist"]),
        (
            ErrorType::Timeout,
            &["timeout", "timed out", "deadline exceeded", "context canceled"],
        ),
        (
            ErrorType::Config,
            &["invalid configuration", "missing", "required"],
        ),
    ];

    let message = message.to_lowercase();
    RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| message.contains(needle)))
        .map_or(ErrorType::Unknown, |(kind, _)| *kind)
}

/// Render an error with its whole source chain, `outer: cause: root`
///
/// Transport errors keep the useful part ("connection refused") in their sources,
/// so classification must see the chain, not just the top-level message.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bmcsecret_reconcile_duration_seconds",
            "Duration of BMCSecret reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create RECONCILE_DURATION metric - this should never happen")
});

static RECONCILE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bmcsecret_reconcile_total",
            "Total number of BMCSecret reconciliations",
        ),
        &["result"],
    )
    .expect("Failed to create RECONCILE_TOTAL metric - this should never happen")
});

static BMC_COUNT: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "bmcsecret_bmc_count",
            "Number of BMCs referencing each BMCSecret",
        ),
        &["secret"],
    )
    .expect("Failed to create BMC_COUNT metric - this should never happen")
});

static SYNC_SUCCESS_PATHS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "bmcsecret_sync_success_paths",
            "Number of backend paths synced successfully in the last pass",
        ),
        &["secret"],
    )
    .expect("Failed to create SYNC_SUCCESS_PATHS metric - this should never happen")
});

static SYNC_FAILED_PATHS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "bmcsecret_sync_failed_paths",
            "Number of backend paths that failed to sync in the last pass",
        ),
        &["secret"],
    )
    .expect("Failed to create SYNC_FAILED_PATHS metric - this should never happen")
});

static SYNC_LAST_SUCCESS: LazyLock<GaugeVec> = LazyLock::new(|| {
    GaugeVec::new(
        Opts::new(
            "bmcsecret_sync_last_success_timestamp",
            "Unix timestamp of the last pass where every path synced",
        ),
        &["secret"],
    )
    .expect("Failed to create SYNC_LAST_SUCCESS metric - this should never happen")
});

static BACKEND_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bmcsecret_backend_operation_duration_seconds",
            "Duration of secret backend operations in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["operation", "backend_type", "engine"],
    )
    .expect("Failed to create BACKEND_OPERATION_DURATION metric - this should never happen")
});

static BACKEND_OPERATION_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bmcsecret_backend_operation_total",
            "Total number of secret backend operations",
        ),
        &["operation", "backend_type", "engine", "result"],
    )
    .expect("Failed to create BACKEND_OPERATION_TOTAL metric - this should never happen")
});

static BACKEND_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bmcsecret_backend_errors_total",
            "Total number of secret backend errors by type",
        ),
        &["operation", "backend_type", "error_type"],
    )
    .expect("Failed to create BACKEND_ERRORS_TOTAL metric - this should never happen")
});

static BACKEND_AUTH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bmcsecret_backend_auth_duration_seconds",
            "Duration of secret backend authentication in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["method", "backend_type"],
    )
    .expect("Failed to create BACKEND_AUTH_DURATION metric - this should never happen")
});

static BACKEND_AUTH_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bmcsecret_backend_auth_total",
            "Total number of secret backend authentication attempts",
        ),
        &["method", "backend_type", "result"],
    )
    .expect("Failed to create BACKEND_AUTH_TOTAL metric - this should never happen")
});

static BMC_DISCOVERY_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bmcsecret_bmc_discovery_duration_seconds",
            "Duration of BMC discovery in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["secret"],
    )
    .expect("Failed to create BMC_DISCOVERY_DURATION metric - this should never happen")
});

static CREDENTIAL_EXTRACTION_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bmcsecret_credential_extraction_total",
            "Total number of credential extractions from BMCSecrets",
        ),
        &["secret", "result"],
    )
    .expect("Failed to create CREDENTIAL_EXTRACTION_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate registration"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILE_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BMC_COUNT.clone()))?;
    REGISTRY.register(Box::new(SYNC_SUCCESS_PATHS.clone()))?;
    REGISTRY.register(Box::new(SYNC_FAILED_PATHS.clone()))?;
    REGISTRY.register(Box::new(SYNC_LAST_SUCCESS.clone()))?;
    REGISTRY.register(Box::new(BACKEND_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(BACKEND_OPERATION_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_AUTH_DURATION.clone()))?;
    REGISTRY.register(Box::new(BACKEND_AUTH_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BMC_DISCOVERY_DURATION.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_EXTRACTION_TOTAL.clone()))?;

    Ok(())
}

fn result_label(error: Option<&str>) -> &'static str {
    if error.is_some() {
        RESULT_ERROR
    } else {
        RESULT_SUCCESS
    }
}

/// [`MetricsCollector`] backed by the process-wide Prometheus registry
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl MetricsCollector for PrometheusMetrics {
    fn record_auth(&self, method: &str, backend_type: &str, duration: Duration, error: Option<&str>) {
        BACKEND_AUTH_DURATION
            .with_label_values(&[method, backend_type])
            .observe(duration.as_secs_f64());
        BACKEND_AUTH_TOTAL
            .with_label_values(&[method, backend_type, result_label(error)])
            .inc();
    }

    fn record_backend_operation(
        &self,
        operation: &str,
        backend_type: &str,
        engine: &str,
        duration: Duration,
        error: Option<&str>,
    ) {
        BACKEND_OPERATION_DURATION
            .with_label_values(&[operation, backend_type, engine])
            .observe(duration.as_secs_f64());
        BACKEND_OPERATION_TOTAL
            .with_label_values(&[operation, backend_type, engine, result_label(error)])
            .inc();
        if let Some(message) = error {
            BACKEND_ERRORS_TOTAL
                .with_label_values(&[operation, backend_type, classify_error(message).as_str()])
                .inc();
        }
    }

    fn record_reconcile(&self, operation: &str, duration: Duration, result: &str) {
        RECONCILE_DURATION
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
        RECONCILE_TOTAL.with_label_values(&[result]).inc();
    }

    fn record_bmc_count(&self, secret: &str, count: usize) {
        BMC_COUNT
            .with_label_values(&[secret])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    fn record_sync_status(&self, secret: &str, successful: u32, failed: u32) {
        SYNC_SUCCESS_PATHS
            .with_label_values(&[secret])
            .set(i64::from(successful));
        SYNC_FAILED_PATHS
            .with_label_values(&[secret])
            .set(i64::from(failed));
        if successful > 0 && failed == 0 {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            SYNC_LAST_SUCCESS.with_label_values(&[secret]).set(now);
        }
    }

    fn record_credential_extraction(&self, secret: &str, error: Option<&str>) {
        CREDENTIAL_EXTRACTION_TOTAL
            .with_label_values(&[secret, result_label(error)])
            .inc();
    }

    fn record_bmc_discovery(&self, secret: &str, duration: Duration) {
        BMC_DISCOVERY_DURATION
            .with_label_values(&[secret])
            .observe(duration.as_secs_f64());
    }
}
