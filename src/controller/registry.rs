//! # Registry
//!
//! Every read and write the controller performs against the Kubernetes API,
//! behind a trait so the reconciler can run against an in-memory registry in tests.

use crate::constants::DEFAULT_BACKEND_CONFIG_NAME;
use crate::crd::{BMCSecret, BMCSecretSyncStatus, SecretBackendConfig, BMC};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("invalid object: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait Registry: Send + Sync + std::fmt::Debug {
    async fn get_bmc_secret(&self, name: &str) -> Result<Option<BMCSecret>, RegistryError>;

    async fn list_bmcs(&self) -> Result<Vec<BMC>, RegistryError>;

    async fn add_finalizer(&self, secret: &BMCSecret, finalizer: &str) -> Result<(), RegistryError>;

    async fn remove_finalizer(&self, secret: &BMCSecret, finalizer: &str)
        -> Result<(), RegistryError>;

    async fn get_sync_status(&self, name: &str)
        -> Result<Option<BMCSecretSyncStatus>, RegistryError>;

    async fn create_sync_status(
        &self,
        status: &BMCSecretSyncStatus,
    ) -> Result<BMCSecretSyncStatus, RegistryError>;

    /// Replace the status subresource
    async fn update_sync_status(&self, status: &BMCSecretSyncStatus) -> Result<(), RegistryError>;

    /// Delete a sync status; deleting a missing one succeeds
    async fn delete_sync_status(&self, name: &str) -> Result<(), RegistryError>;

    /// The `default-backend-config` SecretBackendConfig, if it exists
    async fn get_backend_config(&self) -> Result<Option<SecretBackendConfig>, RegistryError>;

    async fn update_backend_config_status(
        &self,
        config: &SecretBackendConfig,
    ) -> Result<(), RegistryError>;

    /// UTF-8 value of `key` in a core Secret
    async fn read_secret_key(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, RegistryError>;
}

#[derive(Clone)]
pub struct KubeRegistry {
    client: Client,
}

impl std::fmt::Debug for KubeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeRegistry").finish_non_exhaustive()
    }
}

impl KubeRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn set_finalizers(
        &self,
        secret: &BMCSecret,
        finalizers: Vec<String>,
    ) -> Result<(), RegistryError> {
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| RegistryError::Invalid("BMCSecret has no name".to_string()))?;
        let api: Api<BMCSecret> = Api::all(self.client.clone());
        // resourceVersion turns the merge patch into an optimistic update
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": secret.metadata.resource_version,
            }
        });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Registry for KubeRegistry {
    async fn get_bmc_secret(&self, name: &str) -> Result<Option<BMCSecret>, RegistryError> {
        let api: Api<BMCSecret> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn list_bmcs(&self) -> Result<Vec<BMC>, RegistryError> {
        let api: Api<BMC> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn add_finalizer(&self, secret: &BMCSecret, finalizer: &str) -> Result<(), RegistryError> {
        let mut finalizers = secret.metadata.finalizers.clone().unwrap_or_default();
        if finalizers.iter().any(|f| f == finalizer) {
            return Ok(());
        }
        finalizers.push(finalizer.to_string());
        self.set_finalizers(secret, finalizers).await
    }

    async fn remove_finalizer(
        &self,
        secret: &BMCSecret,
        finalizer: &str,
    ) -> Result<(), RegistryError> {
        let finalizers: Vec<String> = secret
            .metadata
            .finalizers
            .iter()
            .flatten()
            .filter(|f| *f != finalizer)
            .cloned()
            .collect();
        match self.set_finalizers(secret, finalizers).await {
            Err(RegistryError::Kube(kube::Error::Api(api_err))) if api_err.code == 404 => Ok(()),
            other => other,
        }
    }

    async fn get_sync_status(
        &self,
        name: &str,
    ) -> Result<Option<BMCSecretSyncStatus>, RegistryError> {
        let api: Api<BMCSecretSyncStatus> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_sync_status(
        &self,
        status: &BMCSecretSyncStatus,
    ) -> Result<BMCSecretSyncStatus, RegistryError> {
        let api: Api<BMCSecretSyncStatus> = Api::all(self.client.clone());
        Ok(api.create(&PostParams::default(), status).await?)
    }

    async fn update_sync_status(&self, status: &BMCSecretSyncStatus) -> Result<(), RegistryError> {
        let name = status
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| RegistryError::Invalid("BMCSecretSyncStatus has no name".to_string()))?;
        let api: Api<BMCSecretSyncStatus> = Api::all(self.client.clone());
        let patch = json!({ "status": status.status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete_sync_status(&self, name: &str) -> Result<(), RegistryError> {
        let api: Api<BMCSecretSyncStatus> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_backend_config(&self) -> Result<Option<SecretBackendConfig>, RegistryError> {
        let api: Api<SecretBackendConfig> = Api::all(self.client.clone());
        Ok(api.get_opt(DEFAULT_BACKEND_CONFIG_NAME).await?)
    }

    async fn update_backend_config_status(
        &self,
        config: &SecretBackendConfig,
    ) -> Result<(), RegistryError> {
        let name = config
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| RegistryError::Invalid("SecretBackendConfig has no name".to_string()))?;
        let api: Api<SecretBackendConfig> = Api::all(self.client.clone());
        let patch = json!({ "status": config.status });
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn read_secret_key(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Option<String>, RegistryError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let Some(secret) = api.get_opt(name).await? else {
            return Ok(None);
        };
        secret
            .data
            .and_then(|mut data| data.remove(key))
            .map(|bytes| {
                String::from_utf8(bytes.0).map_err(|e| {
                    RegistryError::Invalid(format!(
                        "key {key} of secret {namespace}/{name} is not UTF-8: {e}"
                    ))
                })
            })
            .transpose()
    }
}
