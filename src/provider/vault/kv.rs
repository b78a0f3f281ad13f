//! # KV Engine Versions
//!
//! Vault exposes two KV layouts. Version 2 inserts `data/` (values) or `metadata/`
//! (all versions) between the mount and the logical path; version 1 does not.

use crate::provider::StoreError;
use std::collections::HashMap;
use tracing::debug;
use vaultrs::client::VaultClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvVersion {
    V1,
    V2,
}

impl KvVersion {
    /// Decide the version from a mount's type and options
    ///
    /// An explicit `version` option wins; otherwise `kv` and `generic` mounts are
    /// treated as version 2.
    pub fn from_mount(mount_type: &str, options: Option<&HashMap<String, String>>) -> Self {
        match options.and_then(|o| o.get("version")).map(String::as_str) {
            Some("2") => Self::V2,
            Some("1") => Self::V1,
            _ => match mount_type {
                "kv" | "generic" => Self::V2,
                _ => Self::V1,
            },
        }
    }

    /// API path used to read and write values
    pub fn data_path(self, mount: &str, path: &str) -> String {
        match self {
            Self::V2 => format!("{mount}/data/{path}"),
            Self::V1 => format!("{mount}/{path}"),
        }
    }
}

/// List mounts and detect the KV version of `mount_path`
pub(crate) async fn detect_kv_version(
    client: &VaultClient,
    mount_path: &str,
) -> Result<KvVersion, StoreError> {
    let mounts = vaultrs::sys::mount::list(client).await?;
    let key = format!("{}/", mount_path.trim_matches('/'));
    let mount = mounts
        .get(&key)
        .ok_or_else(|| StoreError::MountNotFound(mount_path.to_string()))?;

    let version = KvVersion::from_mount(&mount.mount_type, mount.options.as_ref());
    debug!(mount = mount_path, ?version, "Detected KV version");
    Ok(version)
}
