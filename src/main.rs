//! # BMC Secret Controller
//!
//! Kubernetes controller that writes the credentials of every `BMCSecret` to a
//! HashiCorp Vault KV mount, at one path per BMC that references the secret.
//!
//! ## Overview
//!
//! 1. **Watches BMCSecrets and BMCs** - A BMC change requeues the secret it references
//! 2. **Renders paths** - `bmc/{{.Region}}/{{.Hostname}}/{{.Username}}` by default
//! 3. **Writes on change** - A secret is rewritten only when the stored password differs
//! 4. **Cleans up** - A finalizer removes the written secrets before the BMCSecret goes away
//!
//! Backend settings come from the `default-backend-config` SecretBackendConfig, or
//! from `VAULT_*` environment variables when that resource does not exist.

use anyhow::Result;
use bmc_secret_controller::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
