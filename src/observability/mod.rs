//! # Observability
//!
//! Prometheus metrics and the recording interface the sync engine reports through.

pub mod metrics;

pub use metrics::{
    classify_error, error_chain, register_metrics, ErrorType, MetricsCollector, PrometheusMetrics,
};
