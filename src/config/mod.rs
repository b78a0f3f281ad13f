//! # Configuration
//!
//! - `controller.rs` - Process-level settings (requeue intervals, metrics port, logging)
//! - `backend.rs` - Secret backend configuration, loaded from the SecretBackendConfig
//!   resource or from environment variables

pub mod backend;
pub mod controller;

pub use backend::{
    BackendConfiguration, BackendKind, ConfigError, EngineBinding, TlsSettings, VaultAuth,
    VaultSettings,
};
pub use controller::{ControllerConfig, LogFormat};
