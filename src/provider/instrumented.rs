//! # Instrumented Store
//!
//! Wraps any [`SecretStore`] and reports latency and outcome of every call.

use crate::observability::{error_chain, MetricsCollector};
use crate::provider::{SecretData, SecretStore, StoreError};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug_span, Instrument};

#[derive(Debug)]
pub struct InstrumentedStore {
    inner: Arc<dyn SecretStore>,
    backend_type: String,
    /// Empty for the default destination
    engine: String,
    metrics: Arc<dyn MetricsCollector>,
}

impl InstrumentedStore {
    pub fn new(
        inner: Arc<dyn SecretStore>,
        backend_type: impl Into<String>,
        engine: Option<&str>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            inner,
            backend_type: backend_type.into(),
            engine: engine.unwrap_or_default().to_string(),
            metrics,
        }
    }

    async fn observe<T, F>(&self, operation: &str, path: &str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        let span = debug_span!(
            "secret_store.call",
            operation,
            backend = %self.backend_type,
            engine = %self.engine,
            path
        );
        let started = Instant::now();
        let result = call.instrument(span).await;
        let error = result.as_ref().err().map(|e| error_chain(e));
        self.metrics.record_backend_operation(
            operation,
            &self.backend_type,
            &self.engine,
            started.elapsed(),
            error.as_deref(),
        );
        result
    }
}

#[async_trait]
impl SecretStore for InstrumentedStore {
    async fn write(&self, path: &str, data: &SecretData) -> Result<(), StoreError> {
        self.observe("write", path, self.inner.write(path, data))
            .await
    }

    async fn read(&self, path: &str) -> Result<SecretData, StoreError> {
        self.observe("read", path, self.inner.read(path)).await
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.observe("delete", path, self.inner.delete(path)).await
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.observe("exists", path, self.inner.exists(path)).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }
}
