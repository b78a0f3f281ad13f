//! # Constants
//!
//! Default values and well-known names shared across the controller.

/// Finalizer placed on BMCSecret resources so remote secrets are cleaned up before deletion
pub const BACKEND_CLEANUP_FINALIZER: &str = "bmcsecret.metal.ironcore.dev/backend-cleanup";

/// Name of the singleton SecretBackendConfig resource
pub const DEFAULT_BACKEND_CONFIG_NAME: &str = "default-backend-config";

/// Suffix appended to a BMCSecret name to form its sync status resource name
pub const SYNC_STATUS_SUFFIX: &str = "-sync-status";

/// Default path template for secrets written to the backend
pub const DEFAULT_PATH_TEMPLATE: &str = "bmc/{{.Region}}/{{.Hostname}}/{{.Username}}";

/// Default label key used to read the region from a BMC
pub const DEFAULT_REGION_LABEL_KEY: &str = "region";

/// Region value used when a BMC carries no region label
pub const UNKNOWN_REGION: &str = "unknown";

/// Default backend kind when nothing is configured
pub const DEFAULT_BACKEND_TYPE: &str = "vault";

/// Default Vault authentication method
pub const DEFAULT_VAULT_AUTH_METHOD: &str = "kubernetes";

/// Default mount path of the Vault Kubernetes auth method
pub const DEFAULT_VAULT_KUBERNETES_PATH: &str = "kubernetes";

/// Default Vault KV mount path
pub const DEFAULT_VAULT_MOUNT_PATH: &str = "secret";

/// Projected service account token used for Vault Kubernetes auth
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default requeue interval after a completed reconciliation (seconds)
pub const DEFAULT_REQUEUE_INTERVAL_SECS: u64 = 300;

/// Default requeue interval after a failed reconciliation (seconds)
pub const DEFAULT_ERROR_REQUEUE_INTERVAL_SECS: u64 = 30;

/// Default port for the metrics and probe server
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default number of BMCSecrets reconciled concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 4;

/// Condition type written to sync status and backend config resources
pub const CONDITION_SYNCED: &str = "Synced";

/// Condition type written to the SecretBackendConfig when the cache is reloaded
pub const CONDITION_READY: &str = "Ready";

/// Reporter name used for Kubernetes events
pub const CONTROLLER_NAME: &str = "bmc-secret-controller";
