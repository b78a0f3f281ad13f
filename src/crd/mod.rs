//! # Custom Resource Definitions
//!
//! Resource types read and written by the controller.
//!
//! ## Module Structure
//!
//! - `metal.rs` - BMCSecret and BMC, owned by the metal operator and consumed here
//! - `backend_config.rs` - SecretBackendConfig, the singleton backend configuration
//! - `sync_status.rs` - BMCSecretSyncStatus, per-BMCSecret sync outcomes
//! - `status.rs` - Shared condition type

mod backend_config;
mod metal;
mod status;
mod sync_status;

pub use backend_config::{
    KubernetesAuthConfig, OpenBaoConfig, SecretBackendConfig, SecretBackendConfigSpec,
    SecretBackendConfigStatus, SecretEngineConfig, SecretReference, TlsConfig, TokenAuthConfig,
    VaultConfig,
};
pub use metal::{BMCSecret, BMCSpec, LocalObjectReference, BMC};
pub use status::Condition;
pub use sync_status::{
    sync_status_name, BMCSecretSyncStatus, BMCSecretSyncStatusSpec, BMCSecretSyncStatusStatus,
    BackendPathStatus, SyncOutcome,
};
