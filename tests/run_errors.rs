// tests/run_errors.rs

mod common;
use crate::common::*;

use std::sync::Arc;

use fleetdag::config::env::{INDEXER_IMAGE, POSTGRES_DB, POSTGRES_PASSWORD, POSTGRES_USER, RESTORE_IMAGE};
use fleetdag::errors::FleetdagError;
use fleetdag::exec::Transport;
use fleetdag::run_with;

#[tokio::test]
async fn missing_environment_fails_before_any_remote_action() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let opts = options(dir.path(), &config);
    // DASHBOARD_NAME is missing.
    let env = env_settings(&[
        (POSTGRES_USER, "u"),
        (POSTGRES_PASSWORD, "p"),
        (POSTGRES_DB, "d"),
        (INDEXER_IMAGE, "i"),
        (RESTORE_IMAGE, "r"),
    ]);

    let transport = Arc::new(FakeTransport::new());
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let err = run_with(&opts, &env, dyn_transport).await.unwrap_err();
    match err {
        FleetdagError::Configuration { scope, message } => {
            assert_eq!(scope, "environment");
            assert!(message.contains("DASHBOARD_NAME"), "{message}");
        }
        other => panic!("expected Configuration error, got {other:?}"),
    }
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn dry_run_contacts_no_host() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let mut opts = options(dir.path(), &config);
    opts.dry_run = true;

    let transport = Arc::new(FakeTransport::new());
    let report = run(&opts, &standard_env(), transport.clone()).await;
    assert!(report.instances.is_empty());
    assert!(transport.calls().is_empty());
    assert!(!dir.path().join(".fleetdag").exists());
}

#[tokio::test]
async fn only_restricts_run_and_keeps_other_signatures() {
    init_tracing();
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .fast_settle()
        .local_instance("a", "10.0.0.1", 8332)
        .external_instance("b", "10.0.0.2", "10.0.0.1", 8332)
        .write_to(dir.path());
    let full = options(dir.path(), &config);
    run(&full, &standard_env(), Arc::new(FakeTransport::new())).await;

    let mut only_b = full.clone();
    only_b.only = vec!["b".to_string()];
    let transport = Arc::new(FakeTransport::new());
    let report = run(&only_b, &standard_env(), transport.clone()).await;
    assert_eq!(report.instances.len(), 1);
    assert!(transport.calls_for("10.0.0.1").is_empty());

    // a's records survived the partial run.
    let transport = Arc::new(FakeTransport::new());
    run(&full, &standard_env(), transport.clone()).await;
    assert_eq!(transport.calls_for("10.0.0.1").len(), 1);
}

#[tokio::test]
async fn unknown_only_name_is_configuration_error() {
    let dir = temp_workspace();
    let config = FleetTomlBuilder::new()
        .local_instance("a", "10.0.0.1", 8332)
        .write_to(dir.path());
    let mut opts = options(dir.path(), &config);
    opts.only = vec!["ghost".to_string()];

    let transport: Arc<dyn Transport> = Arc::new(FakeTransport::new());
    let err = run_with(&opts, &standard_env(), transport).await.unwrap_err();
    assert!(matches!(err, FleetdagError::Configuration { .. }));
}
