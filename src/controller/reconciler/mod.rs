//! # Reconciler
//!
//! Core reconciliation logic for `BMCSecret` resources.
//!
//! The reconciler:
//! - Finds the BMCs that reference each BMCSecret
//! - Renders one backend path per (destination, BMC) pair
//! - Writes the credentials where the stored password is missing or stale
//! - Records every outcome in the BMCSecret's `BMCSecretSyncStatus`
//! - Removes the written secrets again when the BMCSecret is deleted

pub mod reconcile;
pub mod resolver;
pub mod status;
pub mod types;

pub use reconcile::reconcile;
pub use resolver::{BmcTarget, CredentialError, Credentials};
pub use status::{SyncStatusTracker, SyncSummary};
pub use types::{Reconciler, ReconcilerError};
