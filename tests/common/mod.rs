//! Shared fixtures for the integration tests: an in-memory registry, a recording
//! secret store, and recording event and metrics sinks.

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use bmc_secret_controller::config::{BackendConfiguration, ControllerConfig};
use bmc_secret_controller::constants::DEFAULT_BACKEND_CONFIG_NAME;
use bmc_secret_controller::controller::events::{EventPublisher, EventReason, SyncEvent};
use bmc_secret_controller::controller::reconciler::Reconciler;
use bmc_secret_controller::controller::registry::{Registry, RegistryError};
use bmc_secret_controller::crd::{
    BMCSecret, BMCSecretSyncStatus, BMCSpec, KubernetesAuthConfig, LocalObjectReference,
    SecretBackendConfig, SecretBackendConfigSpec, SecretEngineConfig, VaultConfig, BMC,
};
use bmc_secret_controller::observability::MetricsCollector;
use bmc_secret_controller::provider::{
    BackendCache, SecretData, SecretStore, StoreConnector, StoreError,
};
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

pub const SECRET_NAME: &str = "rack1-creds";

pub fn init_crypto() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

// Resources

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub fn bmc_secret(name: &str, username: &str, password: &str, label_pairs: &[(&str, &str)]) -> BMCSecret {
    let mut secret = BMCSecret::default();
    secret.metadata.name = Some(name.to_string());
    secret.metadata.labels = Some(labels(label_pairs));
    let mut data = BTreeMap::new();
    data.insert("username".to_string(), ByteString(username.as_bytes().to_vec()));
    data.insert("password".to_string(), ByteString(password.as_bytes().to_vec()));
    secret.data = Some(data);
    secret
}

pub fn bmc(name: &str, secret: &str, region: Option<&str>, hostname: Option<&str>) -> BMC {
    let mut bmc = BMC::new(
        name,
        BMCSpec {
            bmc_secret_ref: Some(LocalObjectReference {
                name: secret.to_string(),
            }),
            endpoint_ref: None,
            hostname: hostname.map(str::to_string),
        },
    );
    if let Some(region) = region {
        bmc.metadata.labels = Some(labels(&[("region", region)]));
    }
    bmc
}

pub fn vault_spec(engines: Vec<SecretEngineConfig>) -> SecretBackendConfigSpec {
    SecretBackendConfigSpec {
        backend: "vault".to_string(),
        vault_config: Some(VaultConfig {
            address: "https://vault.example.com:8200".to_string(),
            auth_method: Some("kubernetes".to_string()),
            kubernetes_auth: Some(KubernetesAuthConfig {
                role: "bmc-secret-operator".to_string(),
                path: None,
            }),
            mount_path: Some("secret".to_string()),
            secret_engines: engines,
            ..VaultConfig::default()
        }),
        ..SecretBackendConfigSpec::default()
    }
}

pub fn engine(name: &str, mount_path: &str, sync_label: &str, template: Option<&str>) -> SecretEngineConfig {
    SecretEngineConfig {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        path_template: template.map(str::to_string),
        sync_label: sync_label.to_string(),
    }
}

pub fn backend_config(spec: SecretBackendConfigSpec) -> SecretBackendConfig {
    SecretBackendConfig::new(DEFAULT_BACKEND_CONFIG_NAME, spec)
}

// Registry

#[derive(Debug, Default)]
pub struct RegistryState {
    pub secrets: BTreeMap<String, BMCSecret>,
    pub bmcs: Vec<BMC>,
    pub sync_statuses: BTreeMap<String, BMCSecretSyncStatus>,
    pub backend_config: Option<SecretBackendConfig>,
    pub core_secrets: BTreeMap<(String, String, String), String>,
    pub fail_list_bmcs: bool,
    pub fail_backend_config: bool,
    pub backend_config_status_updates: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<RegistryState>,
}

impl InMemoryRegistry {
    pub fn with_config(config: SecretBackendConfig) -> Self {
        let registry = Self::default();
        registry.state().backend_config = Some(config);
        registry
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap()
    }

    pub fn put_secret(&self, secret: BMCSecret) {
        self.state().secrets.insert(secret.name_any(), secret);
    }

    pub fn put_bmc(&self, bmc: BMC) {
        self.state().bmcs.push(bmc);
    }

    pub fn secret(&self, name: &str) -> Option<BMCSecret> {
        self.state().secrets.get(name).cloned()
    }

    pub fn sync_status(&self, name: &str) -> Option<BMCSecretSyncStatus> {
        self.state().sync_statuses.get(name).cloned()
    }

    /// Set a deletion timestamp, as the API server does when an object with finalizers is deleted
    pub fn mark_deleted(&self, name: &str) {
        let mut state = self.state();
        let secret = state.secrets.get_mut(name).unwrap();
        let mut value = serde_json::to_value(&*secret).unwrap();
        value["metadata"]["deletionTimestamp"] = serde_json::json!("2026-01-01T00:00:00Z");
        *secret = serde_json::from_value(value).unwrap();
    }

    pub fn remove_label(&self, name: &str, key: &str) {
        let mut state = self.state();
        state.secrets.get_mut(name).unwrap().labels_mut().remove(key);
    }

    pub fn set_password(&self, name: &str, password: &str) {
        let mut state = self.state();
        let secret = state.secrets.get_mut(name).unwrap();
        secret
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert("password".to_string(), ByteString(password.as_bytes().to_vec()));
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn get_bmc_secret(&self, name: &str) -> Result<Option<BMCSecret>, RegistryError> {
        Ok(self.secret(name))
    }

    async fn list_bmcs(&self) -> Result<Vec<BMC>, RegistryError> {
        let state = self.state();
        if state.fail_list_bmcs {
            return Err(RegistryError::Invalid("list bmcs: connection refused".to_string()));
        }
        Ok(state.bmcs.clone())
    }

    async fn add_finalizer(&self, secret: &BMCSecret, finalizer: &str) -> Result<(), RegistryError> {
        let mut state = self.state();
        if let Some(stored) = state.secrets.get_mut(&secret.name_any()) {
            stored
                .metadata
                .finalizers
                .get_or_insert_with(Vec::new)
                .push(finalizer.to_string());
        }
        Ok(())
    }

    async fn remove_finalizer(&self, secret: &BMCSecret, finalizer: &str) -> Result<(), RegistryError> {
        let mut state = self.state();
        if let Some(stored) = state.secrets.get_mut(&secret.name_any()) {
            if let Some(finalizers) = stored.metadata.finalizers.as_mut() {
                finalizers.retain(|f| f != finalizer);
            }
        }
        Ok(())
    }

    async fn get_sync_status(&self, name: &str) -> Result<Option<BMCSecretSyncStatus>, RegistryError> {
        Ok(self.sync_status(name))
    }

    async fn create_sync_status(
        &self,
        status: &BMCSecretSyncStatus,
    ) -> Result<BMCSecretSyncStatus, RegistryError> {
        let mut created = status.clone();
        created.metadata.generation = Some(1);
        self.state()
            .sync_statuses
            .insert(created.name_any(), created.clone());
        Ok(created)
    }

    async fn update_sync_status(&self, status: &BMCSecretSyncStatus) -> Result<(), RegistryError> {
        let mut state = self.state();
        match state.sync_statuses.get_mut(&status.name_any()) {
            Some(stored) => {
                stored.status.clone_from(&status.status);
                Ok(())
            }
            None => Err(RegistryError::Invalid(format!(
                "sync status {} not found",
                status.name_any()
            ))),
        }
    }

    async fn delete_sync_status(&self, name: &str) -> Result<(), RegistryError> {
        self.state().sync_statuses.remove(name);
        Ok(())
    }

    async fn get_backend_config(&self) -> Result<Option<SecretBackendConfig>, RegistryError> {
        let state = self.state();
        if state.fail_backend_config {
            return Err(RegistryError::Invalid("forbidden".to_string()));
        }
        Ok(state.backend_config.clone())
    }

    async fn update_backend_config_status(
        &self,
        config: &SecretBackendConfig,
    ) -> Result<(), RegistryError> {
        let mut state = self.state();
        state.backend_config_status_updates += 1;
        if let Some(stored) = state.backend_config.as_mut() {
            stored.status.clone_from(&config.status);
        }
        Ok(())
    }

    async fn read_secret_key(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, RegistryError> {
        Ok(self
            .state()
            .core_secrets
            .get(&(namespace.to_string(), name.to_string(), key.to_string()))
            .cloned())
    }
}

// Secret store

#[derive(Debug, Default)]
pub struct StoreState {
    pub data: BTreeMap<String, SecretData>,
    pub calls: Vec<String>,
    pub fail_writes: HashSet<String>,
    pub fail_deletes: bool,
    pub fail_close: bool,
    pub closes: usize,
}

#[derive(Debug, Default)]
pub struct MockStore {
    state: Mutex<StoreState>,
}

impl MockStore {
    pub fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation}:");
        self.state()
            .calls
            .iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn writes(&self) -> Vec<String> {
        self.calls("write")
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls("delete")
    }

    pub fn password_at(&self, path: &str) -> Option<String> {
        self.state()
            .data
            .get(path)
            .and_then(|data| data.get("password"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }

    pub fn fail_writes_to(&self, path: &str) {
        self.state().fail_writes.insert(path.to_string());
    }
}

#[async_trait]
impl SecretStore for MockStore {
    async fn write(&self, path: &str, data: &SecretData) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(format!("write:{path}"));
        if state.fail_writes.contains(path) {
            return Err(StoreError::Api {
                status: 403,
                message: "permission denied".to_string(),
            });
        }
        state.data.insert(path.to_string(), data.clone());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<SecretData, StoreError> {
        let mut state = self.state();
        state.calls.push(format!("read:{path}"));
        state
            .data
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(format!("delete:{path}"));
        if state.fail_deletes {
            return Err(StoreError::Backend("delete rejected".to_string()));
        }
        state.data.remove(path);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        state.closes += 1;
        if state.fail_close {
            return Err(StoreError::Backend("close failed".to_string()));
        }
        Ok(())
    }
}

/// Hands out one [`MockStore`] per mount; the same store survives cache rebuilds
#[derive(Debug, Default)]
pub struct MockConnector {
    stores: Mutex<BTreeMap<String, Arc<MockStore>>>,
    failing_mounts: Mutex<HashSet<String>>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn store(&self, mount: &str) -> Arc<MockStore> {
        Arc::clone(
            self.stores
                .lock()
                .unwrap()
                .entry(mount.to_string())
                .or_default(),
        )
    }

    pub fn fail_mount(&self, mount: &str) {
        self.failing_mounts.lock().unwrap().insert(mount.to_string());
    }

    pub fn heal_mount(&self, mount: &str) {
        self.failing_mounts.lock().unwrap().remove(mount);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MockConnector {
    async fn connect(
        &self,
        _config: &BackendConfiguration,
        mount_path: &str,
        _metrics: Option<Arc<dyn MetricsCollector>>,
    ) -> Result<Arc<dyn SecretStore>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.failing_mounts.lock().unwrap().contains(mount_path) {
            return Err(StoreError::Auth("permission denied".to_string()));
        }
        let store: Arc<dyn SecretStore> = self.store(mount_path);
        Ok(store)
    }
}

// Events and metrics

#[derive(Debug, Default)]
pub struct RecordingEvents {
    pub secret_events: Mutex<Vec<(String, SyncEvent)>>,
    pub config_events: Mutex<Vec<(String, SyncEvent)>>,
}

impl RecordingEvents {
    pub fn reasons(&self) -> Vec<EventReason> {
        self.secret_events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.reason)
            .collect()
    }

    pub fn find(&self, reason: EventReason) -> Option<SyncEvent> {
        self.secret_events
            .lock()
            .unwrap()
            .iter()
            .find(|(_, event)| event.reason == reason)
            .map(|(_, event)| event.clone())
    }
}

#[async_trait]
impl EventPublisher for RecordingEvents {
    async fn publish(&self, secret: &BMCSecret, event: SyncEvent) {
        self.secret_events
            .lock()
            .unwrap()
            .push((secret.name_any(), event));
    }

    async fn publish_config(&self, config: &SecretBackendConfig, event: SyncEvent) {
        self.config_events
            .lock()
            .unwrap()
            .push((config.name_any(), event));
    }
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    pub reconciles: Mutex<Vec<(String, String)>>,
    pub sync_status: Mutex<Vec<(u32, u32)>>,
    pub auth: Mutex<Vec<(String, Option<String>)>>,
    pub credential_errors: Mutex<Vec<Option<String>>>,
}

impl MetricsCollector for RecordingMetrics {
    fn record_auth(&self, method: &str, _backend_type: &str, _duration: Duration, error: Option<&str>) {
        self.auth
            .lock()
            .unwrap()
            .push((method.to_string(), error.map(str::to_string)));
    }

    fn record_reconcile(&self, operation: &str, _duration: Duration, result: &str) {
        self.reconciles
            .lock()
            .unwrap()
            .push((operation.to_string(), result.to_string()));
    }

    fn record_sync_status(&self, _secret: &str, successful: u32, failed: u32) {
        self.sync_status.lock().unwrap().push((successful, failed));
    }

    fn record_credential_extraction(&self, _secret: &str, error: Option<&str>) {
        self.credential_errors
            .lock()
            .unwrap()
            .push(error.map(str::to_string));
    }
}

// Harness

#[derive(Debug)]
pub struct Harness {
    pub registry: Arc<InMemoryRegistry>,
    pub connector: Arc<MockConnector>,
    pub events: Arc<RecordingEvents>,
    pub metrics: Arc<RecordingMetrics>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new(spec: SecretBackendConfigSpec) -> Self {
        let registry = Arc::new(InMemoryRegistry::with_config(backend_config(spec)));
        let connector = Arc::new(MockConnector::default());
        let events = Arc::new(RecordingEvents::default());
        let metrics = Arc::new(RecordingMetrics::default());

        let registry_dyn: Arc<dyn Registry> = registry.clone();
        let connector_dyn: Arc<dyn StoreConnector> = connector.clone();
        let cache = Arc::new(BackendCache::new(
            Arc::clone(&registry_dyn),
            connector_dyn,
            None,
        ));
        let events_dyn: Arc<dyn EventPublisher> = events.clone();
        let metrics_dyn: Arc<dyn MetricsCollector> = metrics.clone();
        let reconciler = Arc::new(Reconciler::new(
            registry_dyn,
            cache,
            events_dyn,
            metrics_dyn,
            ControllerConfig::default(),
        ));

        Self {
            registry,
            connector,
            events,
            metrics,
            reconciler,
        }
    }

    pub fn single_store() -> Self {
        Self::new(vault_spec(Vec::new()))
    }

    pub fn default_store(&self) -> Arc<MockStore> {
        self.connector.store("secret")
    }
}
