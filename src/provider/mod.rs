//! # Secret Stores
//!
//! The [`SecretStore`] trait and everything built on it.
//!
//! ## Module Structure
//!
//! - `vault/` - HashiCorp Vault KV v1/v2 store over `vaultrs`
//! - `instrumented.rs` - Decorator that times every store call
//! - `routing.rs` - Label predicates and engine routing
//! - `cache.rs` - Lazily built, atomically swapped backend snapshot

pub mod cache;
pub mod instrumented;
pub mod routing;
pub mod vault;

use async_trait::async_trait;
use thiserror::Error;

pub use cache::{BackendCache, BackendError, CachedState, StoreConnector, VaultConnector};
pub use instrumented::InstrumentedStore;
pub use routing::{EngineRoute, EngineRouter, LabelPredicate, Route};
pub use vault::VaultSecretStore;

/// Key/value payload stored at one path
pub type SecretData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("secret not found at {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unsupported auth method: {0}")]
    UnsupportedAuthMethod(String),

    #[error("invalid TLS configuration: {0}")]
    Tls(String),

    /// The request never got an answer from the backend; the cause is kept as the source
    #[error("request to secret backend failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("secret backend returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("mount {0} not found")]
    MountNotFound(String),

    #[error("unexpected response from secret backend: {0}")]
    Decode(String),

    #[error("secret backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// CRUD contract for a remote credential store
///
/// Paths are logical: they exclude the mount and any schema-specific segments.
/// Every call can be cancelled by dropping its future.
#[async_trait]
pub trait SecretStore: Send + Sync + std::fmt::Debug {
    /// Create or overwrite the secret at `path`
    async fn write(&self, path: &str, data: &SecretData) -> Result<(), StoreError>;

    /// Read the secret at `path`; [`StoreError::NotFound`] when nothing is stored there
    async fn read(&self, path: &str) -> Result<SecretData, StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// `false` exactly when [`SecretStore::read`] would return [`StoreError::NotFound`]
    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self.read(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Release any resources held by the store
    async fn close(&self) -> Result<(), StoreError>;
}
