//! # Vault Secret Store
//!
//! [`SecretStore`] over the Vault KV engines, built on `vaultrs`.
//!
//! Construction builds the client with the configured TLS settings, authenticates,
//! then lists mounts to find out whether the target mount is KV v1 or KV v2.
//! Deleting from a KV v2 mount removes the metadata, which destroys every version
//! of the secret.

mod auth;
mod client;
pub mod kv;

use crate::config::VaultSettings;
use crate::observability::MetricsCollector;
use crate::provider::{SecretData, SecretStore, StoreError};
use async_trait::async_trait;
use client::api_status;
use kv::KvVersion;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};
use vaultrs::client::VaultClient;
use vaultrs::error::ClientError;
use vaultrs::{kv1, kv2};

const NOT_FOUND: u16 = 404;

pub struct VaultSecretStore {
    client: VaultClient,
    mount_path: String,
    kv_version: KvVersion,
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("mount_path", &self.mount_path)
            .field("kv_version", &self.kv_version)
            .finish_non_exhaustive()
    }
}

impl VaultSecretStore {
    /// Connect to Vault and bind the store to `mount_path`
    ///
    /// # Errors
    ///
    /// - [`StoreError::Tls`] when the CA bundle cannot be parsed
    /// - [`StoreError::Auth`] / [`StoreError::UnsupportedAuthMethod`] when login fails
    /// - [`StoreError::MountNotFound`] when the mount does not exist
    pub async fn connect(
        settings: &VaultSettings,
        mount_path: &str,
        metrics: Option<Arc<dyn MetricsCollector>>,
    ) -> Result<Self, StoreError> {
        let span = info_span!(
            "vault.connect",
            address = %settings.address,
            mount = mount_path,
            auth_method = settings.auth.method()
        );
        async move {
            let mut client = client::build_client(settings)?;
            auth::authenticate(&mut client, settings, metrics.as_deref()).await?;
            let mount_path = mount_path.trim_matches('/').to_string();
            let kv_version = kv::detect_kv_version(&client, &mount_path).await?;

            Ok(Self {
                client,
                mount_path,
                kv_version,
            })
        }
        .instrument(span)
        .await
    }

    pub fn kv_version(&self) -> KvVersion {
        self.kv_version
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Full API path of a logical path, including mount and version segment
    pub fn full_path(&self, path: &str) -> String {
        self.kv_version.data_path(&self.mount_path, path)
    }

    async fn read_value(&self, path: &str) -> Result<Value, ClientError> {
        match self.kv_version {
            KvVersion::V2 => kv2::read::<Value>(&self.client, &self.mount_path, path).await,
            KvVersion::V1 => kv1::get::<Value>(&self.client, &self.mount_path, path).await,
        }
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn write(&self, path: &str, data: &SecretData) -> Result<(), StoreError> {
        let path = path.trim_start_matches('/');
        match self.kv_version {
            KvVersion::V2 => {
                kv2::set(&self.client, &self.mount_path, path, data).await?;
            }
            KvVersion::V1 => {
                let fields: HashMap<&str, &Value> =
                    data.iter().map(|(k, v)| (k.as_str(), v)).collect();
                kv1::set(&self.client, &self.mount_path, path, &fields).await?;
            }
        }
        debug!(path = %self.full_path(path), "Wrote secret");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<SecretData, StoreError> {
        let path = path.trim_start_matches('/');
        let full_path = self.full_path(path);
        let value = match self.read_value(path).await {
            Ok(value) => value,
            Err(e) if api_status(&e) == Some(NOT_FOUND) => {
                return Err(StoreError::NotFound(full_path))
            }
            Err(e) => return Err(e.into()),
        };

        // A soft-deleted v2 secret comes back with `data: null`
        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Err(StoreError::NotFound(full_path)),
            other => Err(StoreError::Decode(format!(
                "expected an object at {full_path}, got {other}"
            ))),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let path = path.trim_start_matches('/');
        let result = match self.kv_version {
            KvVersion::V2 => kv2::delete_metadata(&self.client, &self.mount_path, path).await,
            KvVersion::V1 => kv1::delete(&self.client, &self.mount_path, path).await,
        };
        match result {
            Ok(()) => {}
            Err(e) if api_status(&e) == Some(NOT_FOUND) => {
                debug!(path, "Secret already absent");
            }
            Err(e) => return Err(e.into()),
        }
        debug!(path = %self.full_path(path), "Deleted secret");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Nothing to release: the HTTP connection pool is dropped with the store
        Ok(())
    }
}
