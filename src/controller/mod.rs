//! # Controller
//!
//! - `registry.rs` - Kubernetes reads and writes behind the [`registry::Registry`] trait
//! - `events.rs` - Kubernetes events behind the [`events::EventPublisher`] trait
//! - `reconciler/` - BMCSecret reconciliation
//! - `server.rs` - Metrics and probe endpoints

pub mod events;
pub mod reconciler;
pub mod registry;
pub mod server;
