//! # Backend Cache
//!
//! Lazily builds the secret backend (stores, templates, engine routes) from the
//! current configuration and hands out one immutable [`CachedState`] snapshot.
//!
//! Readers take the read lock and clone the `Arc`. The first caller after startup
//! or invalidation takes the write lock, re-checks, and builds the snapshot.
//! Invalidation replaces the whole snapshot, never a field of it, so a reconciliation
//! holding a snapshot always sees stores and templates from the same configuration load.

use crate::config::{BackendConfiguration, ConfigError};
use crate::controller::registry::Registry;
use crate::observability::MetricsCollector;
use crate::paths::PathTemplateBuilder;
use crate::provider::{
    EngineRoute, EngineRouter, InstrumentedStore, LabelPredicate, Route, SecretStore, StoreError,
    VaultSecretStore,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("failed to initialize secret backend: {0}")]
    Store(#[from] StoreError),

    #[error("failed to initialize secret engine {engine}: {source}")]
    Engine {
        engine: String,
        #[source]
        source: StoreError,
    },

    #[error("backend cache is closed")]
    Closed,
}

impl BackendError {
    /// Errors that persist until an operator changes the configuration
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::Configuration(ConfigError::UnsupportedBackend(_))
                | Self::Store(StoreError::UnsupportedAuthMethod(_))
                | Self::Engine {
                    source: StoreError::UnsupportedAuthMethod(_),
                    ..
                }
        )
    }
}

/// Opens a store bound to one mount
#[async_trait]
pub trait StoreConnector: Send + Sync + std::fmt::Debug {
    async fn connect(
        &self,
        config: &BackendConfiguration,
        mount_path: &str,
        metrics: Option<Arc<dyn MetricsCollector>>,
    ) -> Result<Arc<dyn SecretStore>, StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VaultConnector;

#[async_trait]
impl StoreConnector for VaultConnector {
    async fn connect(
        &self,
        config: &BackendConfiguration,
        mount_path: &str,
        metrics: Option<Arc<dyn MetricsCollector>>,
    ) -> Result<Arc<dyn SecretStore>, StoreError> {
        let store = VaultSecretStore::connect(&config.vault, mount_path, metrics).await?;
        Ok(Arc::new(store))
    }
}

/// One configuration load worth of backend state
#[derive(Debug)]
pub struct CachedState {
    pub config: BackendConfiguration,
    pub store: Arc<dyn SecretStore>,
    pub router: EngineRouter,
}

impl CachedState {
    pub fn default_template(&self) -> &PathTemplateBuilder {
        &self.config.default_template
    }

    pub fn region_label_key(&self) -> &str {
        &self.config.region_label_key
    }

    pub fn global_sync_label(&self) -> Option<&LabelPredicate> {
        self.router.global_sync_label()
    }

    /// Destinations for a secret with `labels`
    ///
    /// Without engines this is the single default destination. With engines it is the
    /// matching subset, which may be empty.
    pub fn routes(&self, labels: &BTreeMap<String, String>) -> Vec<Route<'_>> {
        self.destinations(|router| router.resolve(labels))
    }

    /// Destinations to clean up for a secret with `labels`
    ///
    /// Like [`CachedState::routes`] but without the global sync label, so a secret
    /// that lost it is still removed from every engine it was written to.
    pub fn cleanup_routes(&self, labels: &BTreeMap<String, String>) -> Vec<Route<'_>> {
        self.destinations(|router| router.resolve_engines(labels))
    }

    fn destinations<'a>(
        &'a self,
        select: impl FnOnce(&'a EngineRouter) -> Vec<&'a EngineRoute>,
    ) -> Vec<Route<'a>> {
        if !self.router.is_multi_engine() {
            return vec![Route {
                engine: None,
                store: self.store.as_ref(),
                template: &self.config.default_template,
            }];
        }
        select(&self.router)
            .into_iter()
            .map(|engine| Route {
                engine: Some(engine.name.as_str()),
                store: engine.store.as_ref(),
                template: &engine.template,
            })
            .collect()
    }

    /// Close every store; all are attempted, the first error is returned
    async fn close(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        let stores = std::iter::once(&self.store).chain(self.router.engines().iter().map(|e| &e.store));
        for store in stores {
            if let Err(e) = store.close().await {
                warn!(error = %e, "Failed to close secret store");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[derive(Debug)]
enum Slot {
    Empty,
    Ready(Arc<CachedState>),
    Closed,
}

#[derive(Debug)]
pub struct BackendCache {
    registry: Arc<dyn Registry>,
    connector: Arc<dyn StoreConnector>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    slot: RwLock<Slot>,
}

impl BackendCache {
    pub fn new(
        registry: Arc<dyn Registry>,
        connector: Arc<dyn StoreConnector>,
        metrics: Option<Arc<dyn MetricsCollector>>,
    ) -> Self {
        Self {
            registry,
            connector,
            metrics,
            slot: RwLock::new(Slot::Empty),
        }
    }

    /// Current snapshot, building it if needed
    ///
    /// # Errors
    ///
    /// Configuration and store construction errors are returned as-is and nothing is
    /// cached, so the next call retries. [`BackendError::Closed`] after [`BackendCache::close`].
    pub async fn snapshot(&self) -> Result<Arc<CachedState>, BackendError> {
        match &*self.slot.read().await {
            Slot::Ready(state) => return Ok(Arc::clone(state)),
            Slot::Closed => return Err(BackendError::Closed),
            Slot::Empty => {}
        }

        let mut slot = self.slot.write().await;
        match &*slot {
            Slot::Ready(state) => return Ok(Arc::clone(state)),
            Slot::Closed => return Err(BackendError::Closed),
            Slot::Empty => {}
        }

        let state = Arc::new(self.build().await?);
        *slot = Slot::Ready(Arc::clone(&state));
        Ok(state)
    }

    pub async fn store(&self) -> Result<Arc<dyn SecretStore>, BackendError> {
        Ok(Arc::clone(&self.snapshot().await?.store))
    }

    pub async fn default_template(&self) -> Result<PathTemplateBuilder, BackendError> {
        Ok(self.snapshot().await?.default_template().clone())
    }

    pub async fn region_label_key(&self) -> Result<String, BackendError> {
        Ok(self.snapshot().await?.region_label_key().to_string())
    }

    pub async fn global_sync_label(&self) -> Result<Option<LabelPredicate>, BackendError> {
        Ok(self.snapshot().await?.global_sync_label().cloned())
    }

    pub async fn engine_bindings(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<EngineRoute>, BackendError> {
        let state = self.snapshot().await?;
        Ok(state.router.resolve(labels).into_iter().cloned().collect())
    }

    /// Drop the current snapshot so the next access rebuilds it
    ///
    /// # Errors
    ///
    /// Returns the store close error, if any. The snapshot is cleared regardless.
    pub async fn invalidate(&self) -> Result<(), BackendError> {
        self.clear(Slot::Empty).await
    }

    /// Like [`BackendCache::invalidate`], but every later access fails with [`BackendError::Closed`]
    ///
    /// # Errors
    ///
    /// Returns the store close error, if any.
    pub async fn close(&self) -> Result<(), BackendError> {
        self.clear(Slot::Closed).await
    }

    async fn clear(&self, next: Slot) -> Result<(), BackendError> {
        let mut slot = self.slot.write().await;
        let previous = std::mem::replace(&mut *slot, next);
        if let Slot::Ready(state) = previous {
            info!("Discarding cached secret backend");
            state.close().await?;
        }
        Ok(())
    }

    async fn build(&self) -> Result<CachedState, BackendError> {
        let config = BackendConfiguration::load(self.registry.as_ref()).await?;
        let backend_type = config.backend.as_str();

        let store = self
            .connector
            .connect(&config, &config.vault.mount_path, self.metrics.clone())
            .await?;
        let store = self.instrument(store, backend_type, None);

        let mut engines = Vec::with_capacity(config.engines.len());
        for binding in &config.engines {
            let connected = self
                .connector
                .connect(&config, &binding.mount_path, self.metrics.clone())
                .await;
            let engine_store = match connected {
                Ok(engine_store) => engine_store,
                Err(source) => {
                    for opened in std::iter::once(&store).chain(engines.iter().map(|e: &EngineRoute| &e.store)) {
                        if let Err(e) = opened.close().await {
                            warn!(error = %e, "Failed to close secret store after failed initialization");
                        }
                    }
                    return Err(BackendError::Engine {
                        engine: binding.name.clone(),
                        source,
                    });
                }
            };
            engines.push(EngineRoute {
                name: binding.name.clone(),
                mount_path: binding.mount_path.clone(),
                store: self.instrument(engine_store, backend_type, Some(&binding.name)),
                template: binding.template.clone(),
                predicate: binding.sync_label.clone(),
            });
        }

        info!(
            backend = backend_type,
            mount = %config.vault.mount_path,
            engines = engines.len(),
            template = config.default_template.template(),
            "Initialized secret backend"
        );

        let router = EngineRouter::new(config.sync_label.clone(), engines);
        Ok(CachedState {
            config,
            store,
            router,
        })
    }

    fn instrument(
        &self,
        store: Arc<dyn SecretStore>,
        backend_type: &str,
        engine: Option<&str>,
    ) -> Arc<dyn SecretStore> {
        match &self.metrics {
            Some(metrics) => Arc::new(InstrumentedStore::new(
                store,
                backend_type,
                engine,
                Arc::clone(metrics),
            )),
            None => store,
        }
    }
}
