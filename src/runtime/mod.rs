//! # Runtime
//!
//! Process wiring for the controller binary.
//!
//! - `initialization.rs` - Crypto provider, tracing, metrics server, and reconciler setup
//! - `watch_loop.rs` - BMCSecret controller and SecretBackendConfig watch
//! - `config_reload.rs` - Cache invalidation when the backend configuration changes
//! - `error_policy.rs` - Requeue decisions for failed reconciliations

pub mod config_reload;
pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
