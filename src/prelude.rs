//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use bmc_secret_controller::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::provider::{BackendCache, SecretData, SecretStore, StoreConnector, StoreError};

pub use crate::controller::events::{EventPublisher, EventReason, SyncEvent};
pub use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError};
pub use crate::controller::registry::{Registry, RegistryError};

pub use crate::config::{BackendConfiguration, ConfigError, ControllerConfig};

pub use crate::observability::MetricsCollector;
pub use crate::paths::{PathTemplateBuilder, PathVariables};
