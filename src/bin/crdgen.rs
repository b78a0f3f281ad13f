//! # CRD Generator
//!
//! Prints the CustomResourceDefinitions this controller owns as a multi-document YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/bases/bmc-secret-controller.yaml
//! ```
//!
//! BMCSecret and BMC belong to the metal operator and are not generated here.

use bmc_secret_controller::crd::{BMCSecretSyncStatus, SecretBackendConfig};
use kube::core::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let documents = [
        serde_yaml::to_string(&SecretBackendConfig::crd())?,
        serde_yaml::to_string(&BMCSecretSyncStatus::crd())?,
    ];
    print!("{}", documents.join("---\n"));
    Ok(())
}
