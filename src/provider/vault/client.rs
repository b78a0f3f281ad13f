//! # Vault Client
//!
//! Builds the `vaultrs` client from [`VaultSettings`] and maps `vaultrs` errors onto
//! [`StoreError`].

use crate::config::VaultSettings;
use crate::provider::StoreError;
use reqwest::{StatusCode, Url};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;
use tracing::warn;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CA_BUNDLE_DIR: &str = "bmc-secret-controller";

/// Build an unauthenticated client honouring the TLS settings
///
/// Every setting is passed explicitly so the process' own `VAULT_*` variables
/// never override the resolved configuration.
pub(crate) fn build_client(settings: &VaultSettings) -> Result<VaultClient, StoreError> {
    // The vaultrs address setter panics on a malformed URL
    Url::parse(&settings.address).map_err(|e| {
        StoreError::Backend(format!("invalid vault address {:?}: {e}", settings.address))
    })?;

    let ca_certs = match settings.tls.ca_cert_pem.as_deref() {
        Some(pem) => vec![stage_ca_bundle(pem)?],
        None => Vec::new(),
    };
    if settings.tls.skip_verify {
        warn!(address = %settings.address, "TLS verification disabled for Vault");
    }

    let mut builder = VaultClientSettingsBuilder::default();
    builder.address(&settings.address);
    builder.token("");
    builder.timeout(Some(REQUEST_TIMEOUT));
    builder.verify(!settings.tls.skip_verify);
    builder.ca_certs(ca_certs);
    let client_settings = builder
        .build()
        .map_err(|e| StoreError::Backend(format!("invalid vault client settings: {e}")))?;

    VaultClient::new(client_settings)
        .map_err(|e| StoreError::Tls(format!("failed to build vault client: {e}")))
}

/// Write the PEM bundle to a file and return its path
///
/// `vaultrs` loads CA certificates from files only. The file name is derived from
/// the content, so every store built from the same configuration shares one file.
fn stage_ca_bundle(pem: &str) -> Result<String, StoreError> {
    let certs = reqwest::Certificate::from_pem_bundle(pem.as_bytes())
        .map_err(|e| StoreError::Tls(format!("failed to parse CA certificate: {e}")))?;
    if certs.is_empty() {
        return Err(StoreError::Tls(
            "failed to parse CA certificate: no certificates found".to_string(),
        ));
    }

    let mut hasher = DefaultHasher::new();
    pem.hash(&mut hasher);
    let dir = std::env::temp_dir().join(CA_BUNDLE_DIR);
    let path = dir.join(format!("ca-{:016x}.pem", hasher.finish()));

    if std::fs::read_to_string(&path).is_ok_and(|existing| existing == pem) {
        return Ok(path.to_string_lossy().into_owned());
    }
    // Write then rename, so a concurrent reader never sees a partial bundle
    let staging = dir.join(format!("ca-{:016x}.{}.tmp", hasher.finish(), std::process::id()));
    std::fs::create_dir_all(&dir)
        .and_then(|()| std::fs::write(&staging, pem))
        .and_then(|()| std::fs::rename(&staging, &path))
        .map_err(|e| {
            StoreError::Tls(format!(
                "failed to stage CA certificate at {}: {e}",
                path.display()
            ))
        })?;
    Ok(path.to_string_lossy().into_owned())
}

/// HTTP status of an error answered by the Vault API
pub(crate) fn api_status(error: &ClientError) -> Option<u16> {
    match error {
        ClientError::APIError { code, .. } => Some(*code),
        _ => None,
    }
}

impl From<ClientError> for StoreError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::APIError { code, errors } => Self::Api {
                status: code,
                message: api_message(code, &errors),
            },
            other => Self::Transport(Box::new(other)),
        }
    }
}

/// Join Vault's `errors` array, falling back to the status text
fn api_message(code: u16, errors: &[String]) -> String {
    let errors: Vec<&str> = errors
        .iter()
        .map(String::as_str)
        .filter(|e| !e.is_empty())
        .collect();
    if !errors.is_empty() {
        return errors.join("; ");
    }
    StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("unexpected status")
        .to_lowercase()
}
