//! # Config Reload Tests

mod common;

use bmc_secret_controller::controller::events::EventReason;
use bmc_secret_controller::runtime::config_reload::{
    handle_config_applied, handle_config_deleted, ReloadOutcome,
};
use common::*;

#[tokio::test]
async fn test_apply_invalidates_cache_and_updates_status() {
    let harness = Harness::single_store();
    harness.reconciler.cache.snapshot().await.unwrap();

    let mut config = backend_config(vault_spec(Vec::new()));
    config.metadata.generation = Some(2);
    let outcome = handle_config_applied(&harness.reconciler, &config)
        .await
        .unwrap();

    assert_eq!(outcome, ReloadOutcome::Reloaded);
    assert_eq!(harness.default_store().state().closes, 1);

    let stored = harness.registry.state().backend_config.clone().unwrap();
    let status = stored.status.unwrap();
    assert_eq!(status.observed_generation, Some(2));
    assert!(status.last_reload_time.is_some());
    assert_eq!(status.conditions[0].r#type, "Ready");
    assert_eq!(status.conditions[0].status, "True");

    let events = harness.events.config_events.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.reason, EventReason::ConfigReloaded);

    harness.reconciler.cache.snapshot().await.unwrap();
    assert_eq!(harness.connector.connects(), 2);
}

#[tokio::test]
async fn test_status_only_change_is_ignored() {
    let harness = Harness::single_store();
    let mut config = backend_config(vault_spec(Vec::new()));
    config.metadata.generation = Some(3);
    handle_config_applied(&harness.reconciler, &config)
        .await
        .unwrap();

    let observed = harness.registry.state().backend_config.clone().unwrap();
    let mut echoed = config.clone();
    echoed.status = observed.status;
    let outcome = handle_config_applied(&harness.reconciler, &echoed)
        .await
        .unwrap();

    assert_eq!(outcome, ReloadOutcome::Unchanged);
    assert_eq!(harness.registry.state().backend_config_status_updates, 1);
}

#[tokio::test]
async fn test_other_configs_are_ignored() {
    let harness = Harness::single_store();
    let config = bmc_secret_controller::crd::SecretBackendConfig::new(
        "staging-backend-config",
        vault_spec(Vec::new()),
    );

    let outcome = handle_config_applied(&harness.reconciler, &config)
        .await
        .unwrap();

    assert_eq!(outcome, ReloadOutcome::Ignored);
    assert_eq!(harness.registry.state().backend_config_status_updates, 0);
    assert!(harness.events.config_events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_invalidates_cache() {
    let harness = Harness::single_store();
    harness.reconciler.cache.snapshot().await.unwrap();
    let config = backend_config(vault_spec(Vec::new()));

    let outcome = handle_config_deleted(&harness.reconciler, &config).await;

    assert_eq!(outcome, ReloadOutcome::Reloaded);
    assert_eq!(harness.default_store().state().closes, 1);
}
