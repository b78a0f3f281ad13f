//! # Vault Authentication
//!
//! - `kubernetes`: log in with the pod's service account token
//! - `token`: adopt a static token and verify it with `auth/token/lookup-self`
//! - `approle` and anything else: rejected
//!
//! Every attempt is reported to the metrics collector, successful or not.

use crate::config::{VaultAuth, VaultSettings};
use crate::observability::{error_chain, MetricsCollector};
use crate::provider::StoreError;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use vaultrs::client::{Client, VaultClient};
use zeroize::Zeroizing;

const BACKEND_TYPE: &str = "vault";

/// Authenticate `client`, leaving it holding the token for subsequent calls
pub(crate) async fn authenticate(
    client: &mut VaultClient,
    settings: &VaultSettings,
    metrics: Option<&dyn MetricsCollector>,
) -> Result<(), StoreError> {
    let method = settings.auth.method();
    let started = Instant::now();
    let result = match &settings.auth {
        VaultAuth::Kubernetes { role, mount_path } => {
            kubernetes_login(client, &settings.service_account_token_path, role, mount_path).await
        }
        VaultAuth::Token { token } => verify_token(client, token).await,
        VaultAuth::AppRole => Err(StoreError::UnsupportedAuthMethod(
            "approle auth not yet implemented".to_string(),
        )),
        VaultAuth::Unsupported(method) => Err(StoreError::UnsupportedAuthMethod(method.clone())),
    };

    // Unsupported methods never reach Vault, so there is no attempt to report
    if !matches!(result, Err(StoreError::UnsupportedAuthMethod(_))) {
        if let Some(metrics) = metrics {
            let error = result.as_ref().err().map(|e| error_chain(e));
            metrics.record_auth(method, BACKEND_TYPE, started.elapsed(), error.as_deref());
        }
    }

    match &result {
        Ok(()) => info!(method, "Authenticated to Vault"),
        Err(e) => warn!(method, error = %e, "Vault authentication failed"),
    }
    result
}

async fn kubernetes_login(
    client: &mut VaultClient,
    token_path: &Path,
    role: &str,
    mount_path: &str,
) -> Result<(), StoreError> {
    let jwt = Zeroizing::new(tokio::fs::read_to_string(token_path).await.map_err(|e| {
        StoreError::Auth(format!(
            "failed to read service account token {}: {e}",
            token_path.display()
        ))
    })?);

    let mount = mount_path.trim_matches('/');
    debug!(mount, role, "Logging in to Vault with Kubernetes auth");
    let auth = vaultrs::auth::kubernetes::login(&*client, mount, role, jwt.trim())
        .await
        .map_err(|e| StoreError::Auth(format!("kubernetes login failed: {}", error_chain(&e))))?;

    let client_token = Zeroizing::new(auth.client_token);
    if client_token.is_empty() {
        return Err(StoreError::Auth(
            "no client token returned from kubernetes login".to_string(),
        ));
    }
    client.set_token(&client_token);
    Ok(())
}

async fn verify_token(client: &mut VaultClient, token: &str) -> Result<(), StoreError> {
    if token.is_empty() {
        return Err(StoreError::Auth("vault token is empty".to_string()));
    }

    client.set_token(token);
    vaultrs::token::lookup_self(&*client)
        .await
        .map_err(|e| StoreError::Auth(format!("token validation failed: {}", error_chain(&e))))?;
    Ok(())
}
