//! # SecretBackendConfig
//!
//! Cluster-scoped singleton (`default-backend-config`) describing where BMC
//! credentials are written. When it is absent the controller falls back to
//! environment variables.

use crate::crd::Condition;
use serde::{Deserialize, Serialize};

/// SecretBackendConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: config.metal.ironcore.dev/v1alpha1
/// kind: SecretBackendConfig
/// metadata:
///   name: default-backend-config
/// spec:
///   backend: vault
///   vaultConfig:
///     address: https://vault.example.com:8200
///     authMethod: kubernetes
///     kubernetesAuth:
///       role: bmc-secret-operator
///     mountPath: secret
///     secretEngines:
///       - name: production
///         mountPath: prod-secrets
///         syncLabel: env=production
///   pathTemplate: "bmc/{{.Region}}/{{.Hostname}}/{{.Username}}"
///   syncLabel: sync-enabled
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SecretBackendConfig",
    group = "config.metal.ironcore.dev",
    version = "v1alpha1",
    status = "SecretBackendConfigStatus",
    shortname = "sbc",
    printcolumn = r#"{"name":"Backend", "type":"string", "jsonPath":".spec.backend"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretBackendConfigSpec {
    /// Backend kind: `vault` or `openbao`
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_config: Option<VaultConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_bao_config: Option<OpenBaoConfig>,
    /// Default path template, e.g. `bmc/{{.Region}}/{{.Hostname}}/{{.Username}}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,
    /// Label key holding a BMC's region (default `region`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_label_key: Option<String>,
    /// Only BMCSecrets matching this label (`key` or `key=value`) are synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub address: String,
    /// `kubernetes`, `token` or `approle`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_auth: Option<KubernetesAuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_auth: Option<TokenAuthConfig>,
    /// KV mount used when no secret engines are configured (default `secret`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
    /// Label-routed KV engines; when empty every BMCSecret goes to `mountPath`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_engines: Vec<SecretEngineConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretEngineConfig {
    /// Unique engine name, lowercase alphanumerics and dashes
    pub name: String,
    pub mount_path: String,
    /// Path template for this engine; the default template when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_template: Option<String>,
    /// `key` or `key=value`
    pub sync_label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesAuthConfig {
    pub role: String,
    /// Auth mount path (default `kubernetes`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenAuthConfig {
    pub secret_ref: SecretReference,
}

/// Key of a core Secret
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Disable certificate verification. Never use in production.
    #[serde(default)]
    pub skip_verify: bool,
    /// PEM-encoded CA bundle used to verify the Vault server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenBaoConfig {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretBackendConfigStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    /// Last time the controller dropped its cached backend because of a change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reload_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
