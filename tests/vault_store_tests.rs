//! # Vault Store Tests
//!
//! Exercises the Vault store against a wiremock server standing in for the Vault HTTP API.

mod common;

use bmc_secret_controller::config::{VaultAuth, VaultSettings};
use bmc_secret_controller::observability::MetricsCollector;
use bmc_secret_controller::provider::vault::kv::KvVersion;
use bmc_secret_controller::provider::{SecretData, SecretStore, StoreError, VaultSecretStore};
use common::{init_crypto, RecordingMetrics};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zeroize::Zeroizing;

const TOKEN: &str = "hvs.test-token";
const SECRET_PATH: &str = "bmc/us-east-1/bmc1.example.com/admin";

fn token_settings(server: &MockServer) -> VaultSettings {
    VaultSettings::new(
        server.uri(),
        VaultAuth::Token {
            token: Zeroizing::new(TOKEN.to_string()),
        },
    )
}

fn kubernetes_settings(server: &MockServer) -> VaultSettings {
    VaultSettings::new(
        server.uri(),
        VaultAuth::Kubernetes {
            role: "bmc-secret-operator".to_string(),
            mount_path: "kubernetes".to_string(),
        },
    )
}

fn credentials() -> SecretData {
    let mut data = SecretData::new();
    data.insert("username".to_string(), json!("admin"));
    data.insert("password".to_string(), json!("s3cret"));
    data
}

/// Wrap `data` in Vault's response envelope
fn vault_response(data: Value) -> Value {
    json!({
        "request_id": "9b3c3a1e-0000-4000-8000-000000000000",
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": data,
        "wrap_info": null,
        "warnings": null,
        "auth": null
    })
}

fn login_response(client_token: &str) -> Value {
    let mut body = vault_response(Value::Null);
    body["auth"] = json!({
        "client_token": client_token,
        "accessor": "accessor-1",
        "policies": ["default", "bmc-secrets"],
        "token_policies": ["default", "bmc-secrets"],
        "metadata": {"role": "bmc-secret-operator"},
        "lease_duration": 3600,
        "renewable": true,
        "entity_id": "entity-1",
        "token_type": "service",
        "orphan": true
    });
    body
}

fn lookup_self_response() -> Value {
    vault_response(json!({
        "accessor": "accessor-1",
        "creation_time": 1_760_000_000,
        "creation_ttl": 0,
        "display_name": "token",
        "entity_id": "",
        "expire_time": "2026-12-31T00:00:00Z",
        "explicit_max_ttl": 0,
        "id": TOKEN,
        "identity_policies": [],
        "issue_time": "2026-10-01T00:00:00Z",
        "meta": {},
        "num_uses": 0,
        "orphan": false,
        "path": "auth/token/create",
        "policies": ["default", "bmc-secrets"],
        "renewable": false,
        "ttl": 0,
        "type": "service"
    }))
}

/// A `sys/mounts` entry of the given type and declared KV version
fn mount_entry(mount_type: &str, version: Option<&str>) -> Value {
    let options = version.map_or(Value::Null, |v| json!({"version": v}));
    json!({
        "accessor": format!("{mount_type}_1234"),
        "config": {"default_lease_ttl": 0, "force_no_cache": false, "max_lease_ttl": 0},
        "description": "",
        "external_entropy_access": false,
        "local": false,
        "options": options,
        "seal_wrap": false,
        "type": mount_type
    })
}

fn version_metadata(version: u64) -> Value {
    json!({
        "created_time": "2026-10-01T00:00:00Z",
        "custom_metadata": null,
        "deletion_time": "",
        "destroyed": false,
        "version": version
    })
}

async fn mount_lookup_self(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("X-Vault-Token", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(lookup_self_response()))
        .mount(server)
        .await;
}

async fn mount_mounts(server: &MockServer, mounts: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/sys/mounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vault_response(mounts)))
        .mount(server)
        .await;
}

async fn kv2_store(server: &MockServer) -> VaultSecretStore {
    init_crypto();
    mount_lookup_self(server).await;
    mount_mounts(server, json!({"secret/": mount_entry("kv", Some("2"))})).await;
    VaultSecretStore::connect(&token_settings(server), "secret", None)
        .await
        .unwrap()
}

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_kubernetes_login_uses_service_account_token() {
        init_crypto();
        let server = MockServer::start().await;
        let mut token_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(token_file, "service-account-jwt").unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/auth/kubernetes/login"))
            .and(body_partial_json(
                json!({"jwt": "service-account-jwt", "role": "bmc-secret-operator"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(login_response("hvs.issued")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/sys/mounts"))
            .and(header("X-Vault-Token", "hvs.issued"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vault_response(json!({"secret/": mount_entry("kv", None)}))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = kubernetes_settings(&server);
        settings.service_account_token_path = token_file.path().to_path_buf();

        let store = VaultSecretStore::connect(&settings, "secret", None)
            .await
            .unwrap();
        assert_eq!(store.kv_version(), KvVersion::V2);
    }

    #[tokio::test]
    async fn test_missing_service_account_token() {
        init_crypto();
        let server = MockServer::start().await;
        let mut settings = kubernetes_settings(&server);
        settings.service_account_token_path = "/nonexistent/token".into();

        let err = VaultSecretStore::connect(&settings, "secret", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Auth(_)));
    }

    #[tokio::test]
    async fn test_missing_service_account_token_is_recorded() {
        init_crypto();
        let server = MockServer::start().await;
        let mut settings = kubernetes_settings(&server);
        settings.service_account_token_path = "/nonexistent/token".into();
        let metrics = Arc::new(RecordingMetrics::default());
        let collector: Arc<dyn MetricsCollector> = metrics.clone();

        VaultSecretStore::connect(&settings, "secret", Some(collector))
            .await
            .unwrap_err();

        let auth = metrics.auth.lock().unwrap();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].0, "kubernetes");
        let error = auth[0].1.as_deref().unwrap();
        assert!(error.contains("failed to read service account token /nonexistent/token"));
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        init_crypto();
        let server = MockServer::start().await;
        let settings = VaultSettings::new(
            server.uri(),
            VaultAuth::Token {
                token: Zeroizing::new(String::new()),
            },
        );

        let err = VaultSecretStore::connect(&settings, "secret", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "authentication failed: vault token is empty");
    }

    #[tokio::test]
    async fn test_rejected_token_is_recorded() {
        init_crypto();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        let metrics = Arc::new(RecordingMetrics::default());
        let collector: Arc<dyn MetricsCollector> = metrics.clone();

        let err = VaultSecretStore::connect(&token_settings(&server), "secret", Some(collector))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Auth(_)));
        let auth = metrics.auth.lock().unwrap();
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].0, "token");
        let error = auth[0].1.as_deref().unwrap();
        assert!(error.starts_with("authentication failed: token validation failed"));
    }

    #[tokio::test]
    async fn test_approle_is_unsupported() {
        init_crypto();
        let server = MockServer::start().await;
        let settings = VaultSettings::new(server.uri(), VaultAuth::AppRole);

        let err = VaultSecretStore::connect(&settings, "secret", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedAuthMethod(_)));
    }

    #[tokio::test]
    async fn test_auth_attempts_are_recorded() {
        init_crypto();
        let server = MockServer::start().await;
        mount_lookup_self(&server).await;
        mount_mounts(&server, json!({"secret/": mount_entry("kv", None)})).await;
        let metrics = Arc::new(RecordingMetrics::default());
        let collector: Arc<dyn MetricsCollector> = metrics.clone();

        VaultSecretStore::connect(&token_settings(&server), "secret", Some(collector))
            .await
            .unwrap();

        assert_eq!(
            *metrics.auth.lock().unwrap(),
            vec![("token".to_string(), None)]
        );
    }
}

mod mount_tests {
    use super::*;

    #[tokio::test]
    async fn test_detects_kv_v1() {
        init_crypto();
        let server = MockServer::start().await;
        mount_lookup_self(&server).await;
        mount_mounts(&server, json!({"kv/": mount_entry("kv", Some("1"))})).await;

        let store = VaultSecretStore::connect(&token_settings(&server), "kv", None)
            .await
            .unwrap();

        assert_eq!(store.kv_version(), KvVersion::V1);
        assert_eq!(store.full_path(SECRET_PATH), format!("kv/{SECRET_PATH}"));
    }

    #[tokio::test]
    async fn test_missing_mount() {
        init_crypto();
        let server = MockServer::start().await;
        mount_lookup_self(&server).await;
        mount_mounts(&server, json!({"secret/": mount_entry("kv", None)})).await;

        let err = VaultSecretStore::connect(&token_settings(&server), "prod-secrets", None)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::MountNotFound(ref mount) if mount == "prod-secrets"));
    }
}

mod kv_tests {
    use super::*;

    #[tokio::test]
    async fn test_v2_write_wraps_data() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/secret/data/{SECRET_PATH}")))
            .and(header("X-Vault-Token", TOKEN))
            .and(body_partial_json(
                json!({"data": {"username": "admin", "password": "s3cret"}}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vault_response(version_metadata(1))),
            )
            .expect(1)
            .mount(&server)
            .await;

        store.write(SECRET_PATH, &credentials()).await.unwrap();
    }

    #[tokio::test]
    async fn test_v2_read_unwraps_data() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/secret/data/{SECRET_PATH}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(vault_response(json!({
                "data": {"username": "admin", "password": "s3cret"},
                "metadata": version_metadata(1)
            }))))
            .mount(&server)
            .await;

        let data = store.read(SECRET_PATH).await.unwrap();

        assert_eq!(data, credentials());
        assert!(store.exists(SECRET_PATH).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_secret() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/secret/data/{SECRET_PATH}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;

        assert!(!store.exists(SECRET_PATH).await.unwrap());
        assert!(store.read(SECRET_PATH).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_soft_deleted_v2_secret_is_missing() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        let mut metadata = version_metadata(2);
        metadata["deletion_time"] = json!("2026-10-02T00:00:00Z");
        Mock::given(method("GET"))
            .and(path(format!("/v1/secret/data/{SECRET_PATH}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(vault_response(json!({"data": null, "metadata": metadata}))),
            )
            .mount(&server)
            .await;

        assert!(!store.exists(SECRET_PATH).await.unwrap());
    }

    #[tokio::test]
    async fn test_v2_delete_removes_metadata() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        Mock::given(method("DELETE"))
            .and(path(format!("/v1/secret/metadata/{SECRET_PATH}")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        store.delete(SECRET_PATH).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_of_missing_secret_succeeds() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        Mock::given(method("DELETE"))
            .and(path(format!("/v1/secret/metadata/{SECRET_PATH}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;

        store.delete(SECRET_PATH).await.unwrap();
    }

    #[tokio::test]
    async fn test_v1_write_sends_flat_data() {
        init_crypto();
        let server = MockServer::start().await;
        mount_lookup_self(&server).await;
        mount_mounts(&server, json!({"kv/": mount_entry("kv", Some("1"))})).await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/kv/{SECRET_PATH}")))
            .and(body_partial_json(json!({"username": "admin", "password": "s3cret"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let store = VaultSecretStore::connect(&token_settings(&server), "kv", None)
            .await
            .unwrap();

        store.write(SECRET_PATH, &credentials()).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_error_carries_vault_message() {
        let server = MockServer::start().await;
        let store = kv2_store(&server).await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/secret/data/{SECRET_PATH}")))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
            )
            .mount(&server)
            .await;

        let err = store.write(SECRET_PATH, &credentials()).await.unwrap_err();

        assert!(matches!(err, StoreError::Api { status: 403, .. }));
        assert_eq!(
            err.to_string(),
            "secret backend returned 403: permission denied"
        );
    }
}
