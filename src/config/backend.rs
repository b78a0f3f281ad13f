//! # Backend Configuration
//!
//! Resolves where and how credentials are written. The `default-backend-config`
//! SecretBackendConfig resource is preferred; when it does not exist the
//! configuration is read from environment variables.
//!
//! Loading is all-or-nothing: every template is compiled and every engine is
//! validated before a [`BackendConfiguration`] is returned.
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `SECRET_BACKEND_TYPE` | `vault` |
//! | `VAULT_ADDR` | required |
//! | `VAULT_AUTH_METHOD` | `kubernetes` |
//! | `VAULT_ROLE` | |
//! | `VAULT_KUBERNETES_PATH` | `kubernetes` |
//! | `VAULT_TOKEN` | |
//! | `VAULT_MOUNT_PATH` | `secret` |
//! | `VAULT_SKIP_VERIFY` | `false` |
//! | `VAULT_CACERT` | path to a PEM bundle |
//! | `PATH_TEMPLATE` | `bmc/{{.Region}}/{{.Hostname}}/{{.Username}}` |
//! | `REGION_LABEL_KEY` | `region` |
//! | `SYNC_LABEL` | |

use crate::constants::{
    DEFAULT_BACKEND_TYPE, DEFAULT_PATH_TEMPLATE, DEFAULT_REGION_LABEL_KEY,
    DEFAULT_VAULT_AUTH_METHOD, DEFAULT_VAULT_KUBERNETES_PATH, DEFAULT_VAULT_MOUNT_PATH,
    SERVICE_ACCOUNT_TOKEN_PATH,
};
use crate::controller::registry::Registry;
use crate::crd::{SecretBackendConfigSpec, SecretEngineConfig};
use crate::paths::{PathTemplateBuilder, TemplateError};
use crate::provider::LabelPredicate;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

static ENGINE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("engine name pattern is valid")
});

const MAX_ENGINE_NAME_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("failed to read backend configuration: {0}")]
    Registry(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Vault,
}

impl BackendKind {
    /// Resolve a configured backend name
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedBackend`] for anything other than `vault`.
    pub fn parse(kind: &str) -> Result<Self, ConfigError> {
        match kind.trim().to_lowercase().as_str() {
            "" | "vault" => Ok(Self::Vault),
            "openbao" => Err(ConfigError::UnsupportedBackend(
                "openbao backend not yet implemented".to_string(),
            )),
            other => Err(ConfigError::UnsupportedBackend(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vault => "vault",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vault authentication settings
#[derive(Clone, PartialEq, Eq)]
pub enum VaultAuth {
    /// Service account token login against `auth/<mount_path>/login`
    Kubernetes { role: String, mount_path: String },
    /// Pre-issued token, verified with `lookup-self`
    Token { token: Zeroizing<String> },
    AppRole,
    Unsupported(String),
}

impl VaultAuth {
    fn from_method(
        method: &str,
        role: Option<String>,
        kubernetes_path: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ConfigError> {
        match method.trim().to_lowercase().as_str() {
            "" | "kubernetes" => Ok(Self::Kubernetes {
                role: role
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| ConfigError::Missing("vault kubernetes auth role".to_string()))?,
                mount_path: kubernetes_path
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| DEFAULT_VAULT_KUBERNETES_PATH.to_string()),
            }),
            "token" => Ok(Self::Token {
                token: Zeroizing::new(token.unwrap_or_default()),
            }),
            "approle" => Ok(Self::AppRole),
            other => Ok(Self::Unsupported(other.to_string())),
        }
    }

    /// Method name used in logs and metrics
    pub fn method(&self) -> &str {
        match self {
            Self::Kubernetes { .. } => "kubernetes",
            Self::Token { .. } => "token",
            Self::AppRole => "approle",
            Self::Unsupported(method) => method,
        }
    }
}

impl fmt::Debug for VaultAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kubernetes { role, mount_path } => f
                .debug_struct("Kubernetes")
                .field("role", role)
                .field("mount_path", mount_path)
                .finish(),
            Self::Token { .. } => f.debug_struct("Token").finish_non_exhaustive(),
            Self::AppRole => f.write_str("AppRole"),
            Self::Unsupported(method) => f.debug_tuple("Unsupported").field(method).finish(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    pub skip_verify: bool,
    /// PEM text of the CA bundle
    pub ca_cert_pem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSettings {
    pub address: String,
    pub auth: VaultAuth,
    /// Mount used for the default destination
    pub mount_path: String,
    pub tls: TlsSettings,
    /// Service account token read by Kubernetes auth
    pub service_account_token_path: PathBuf,
}

impl VaultSettings {
    pub fn new(address: impl Into<String>, auth: VaultAuth) -> Self {
        Self {
            address: address.into(),
            auth,
            mount_path: DEFAULT_VAULT_MOUNT_PATH.to_string(),
            tls: TlsSettings::default(),
            service_account_token_path: PathBuf::from(SERVICE_ACCOUNT_TOKEN_PATH),
        }
    }
}

/// A validated secret engine
#[derive(Debug, Clone)]
pub struct EngineBinding {
    pub name: String,
    pub mount_path: String,
    pub template: PathTemplateBuilder,
    pub sync_label: LabelPredicate,
}

/// Fully resolved backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfiguration {
    pub backend: BackendKind,
    pub vault: VaultSettings,
    pub default_template: PathTemplateBuilder,
    pub region_label_key: String,
    pub sync_label: Option<LabelPredicate>,
    pub engines: Vec<EngineBinding>,
}

impl BackendConfiguration {
    /// Load from the SecretBackendConfig resource, or from the environment when it does not exist
    ///
    /// # Errors
    ///
    /// Any registry failure other than "not found" is reported as [`ConfigError::Registry`]
    /// instead of silently switching configuration sources.
    pub async fn load(registry: &dyn Registry) -> Result<Self, ConfigError> {
        match registry.get_backend_config().await {
            Ok(Some(resource)) => {
                debug!("Loading backend configuration from SecretBackendConfig");
                Self::from_resource(&resource.spec, registry).await
            }
            Ok(None) => {
                info!("No SecretBackendConfig found, loading backend configuration from environment");
                Self::from_env()
            }
            Err(e) => Err(ConfigError::Registry(e.to_string())),
        }
    }

    /// # Errors
    ///
    /// See [`BackendConfiguration::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from environment-style variables; empty values count as unset
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `VAULT_ADDR` is missing, the backend is not
    /// supported, or a template or label does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let backend = BackendKind::parse(
            &var("SECRET_BACKEND_TYPE").unwrap_or_else(|| DEFAULT_BACKEND_TYPE.to_string()),
        )?;

        let address = var("VAULT_ADDR").ok_or_else(|| ConfigError::Missing("VAULT_ADDR".to_string()))?;
        let auth = VaultAuth::from_method(
            &var("VAULT_AUTH_METHOD").unwrap_or_else(|| DEFAULT_VAULT_AUTH_METHOD.to_string()),
            var("VAULT_ROLE"),
            var("VAULT_KUBERNETES_PATH"),
            var("VAULT_TOKEN"),
        )?;

        let ca_cert_pem = match var("VAULT_CACERT") {
            Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                ConfigError::Invalid(format!("failed to read VAULT_CACERT {path}: {e}"))
            })?),
            None => None,
        };

        let mut vault = VaultSettings::new(address, auth);
        if let Some(mount) = var("VAULT_MOUNT_PATH") {
            vault.mount_path = mount;
        }
        vault.tls = TlsSettings {
            skip_verify: var("VAULT_SKIP_VERIFY").is_some_and(|v| v == "true"),
            ca_cert_pem,
        };

        Self::assemble(
            backend,
            vault,
            var("PATH_TEMPLATE"),
            var("REGION_LABEL_KEY"),
            var("SYNC_LABEL"),
            &[],
        )
    }

    /// Build from a SecretBackendConfig spec
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when required fields are missing, the backend is not
    /// supported, the token secret cannot be read, or validation fails.
    pub async fn from_resource(
        spec: &SecretBackendConfigSpec,
        registry: &dyn Registry,
    ) -> Result<Self, ConfigError> {
        let backend = BackendKind::parse(&spec.backend)?;
        let vault_config = spec
            .vault_config
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("spec.vaultConfig".to_string()))?;
        if vault_config.address.is_empty() {
            return Err(ConfigError::Missing("spec.vaultConfig.address".to_string()));
        }

        let token = match vault_config.token_auth.as_ref() {
            Some(token_auth) => {
                let r = &token_auth.secret_ref;
                let token = registry
                    .read_secret_key(&r.namespace, &r.name, &r.key)
                    .await
                    .map_err(|e| ConfigError::Registry(e.to_string()))?
                    .ok_or_else(|| {
                        ConfigError::Missing(format!(
                            "key {} of secret {}/{}",
                            r.key, r.namespace, r.name
                        ))
                    })?;
                Some(token)
            }
            None => None,
        };

        let kubernetes_auth = vault_config.kubernetes_auth.as_ref();
        let auth = VaultAuth::from_method(
            vault_config
                .auth_method
                .as_deref()
                .unwrap_or(DEFAULT_VAULT_AUTH_METHOD),
            kubernetes_auth.map(|k| k.role.clone()),
            kubernetes_auth.and_then(|k| k.path.clone()),
            token,
        )?;

        let mut vault = VaultSettings::new(vault_config.address.clone(), auth);
        if let Some(mount) = vault_config.mount_path.as_ref().filter(|m| !m.is_empty()) {
            vault.mount_path.clone_from(mount);
        }
        if let Some(tls) = vault_config.tls_config.as_ref() {
            vault.tls = TlsSettings {
                skip_verify: tls.skip_verify,
                ca_cert_pem: tls.ca_cert.clone().filter(|pem| !pem.is_empty()),
            };
        }

        Self::assemble(
            backend,
            vault,
            spec.path_template.clone().filter(|t| !t.is_empty()),
            spec.region_label_key.clone().filter(|k| !k.is_empty()),
            spec.sync_label.clone().filter(|l| !l.is_empty()),
            &vault_config.secret_engines,
        )
    }

    fn assemble(
        backend: BackendKind,
        vault: VaultSettings,
        path_template: Option<String>,
        region_label_key: Option<String>,
        sync_label: Option<String>,
        engines: &[SecretEngineConfig],
    ) -> Result<Self, ConfigError> {
        let default_template =
            PathTemplateBuilder::new(path_template.as_deref().unwrap_or(DEFAULT_PATH_TEMPLATE))?;

        let sync_label = sync_label.as_deref().map(LabelPredicate::parse).transpose()?;

        let mut seen = HashSet::new();
        let engines = engines
            .iter()
            .map(|engine| {
                if engine.name.len() > MAX_ENGINE_NAME_LEN || !ENGINE_NAME.is_match(&engine.name) {
                    return Err(ConfigError::Invalid(format!(
                        "secret engine name {:?} must be a lowercase DNS label",
                        engine.name
                    )));
                }
                if !seen.insert(engine.name.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate secret engine name {:?}",
                        engine.name
                    )));
                }
                if engine.mount_path.trim().is_empty() {
                    return Err(ConfigError::Missing(format!(
                        "mountPath of secret engine {}",
                        engine.name
                    )));
                }
                // Engines never inherit the global template
                let template = PathTemplateBuilder::new(
                    engine
                        .path_template
                        .as_deref()
                        .filter(|t| !t.is_empty())
                        .unwrap_or(DEFAULT_PATH_TEMPLATE),
                )?;
                Ok(EngineBinding {
                    name: engine.name.clone(),
                    mount_path: engine.mount_path.clone(),
                    template,
                    sync_label: LabelPredicate::parse(&engine.sync_label)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            backend,
            vault,
            default_template,
            region_label_key: region_label_key
                .unwrap_or_else(|| DEFAULT_REGION_LABEL_KEY.to_string()),
            sync_label,
            engines,
        })
    }

    pub fn has_multi_engine_config(&self) -> bool {
        !self.engines.is_empty()
    }
}
